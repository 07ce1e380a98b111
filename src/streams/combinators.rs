//! Stream combinators over `futures` streams.
//!
//! Everything here returns a boxed `'static` stream so the results can be
//! moved straight into a spawned task.

use futures::future::{self, Either};
use futures::stream::{self, BoxStream, Stream, StreamExt};

/// Combine `N` streams of the same item type.
///
/// Nothing is emitted until every input has produced at least one item; from
/// then on each update from any input emits the latest item of every input,
/// in input order. The output ends when all inputs have ended.
///
/// # Example
/// ```
/// use futures::stream::{self, StreamExt};
/// use route_pilot::streams::combine_latest;
///
/// # futures::executor::block_on(async {
/// let combined: Vec<[u32; 2]> =
///     combine_latest([stream::iter(vec![1]).boxed(), stream::iter(vec![2]).boxed()])
///         .collect()
///         .await;
/// assert_eq!(combined, vec![[1, 2]]);
/// # });
/// ```
pub fn combine_latest<S, T, const N: usize>(streams: [S; N]) -> BoxStream<'static, [T; N]>
where
    S: Stream<Item = T> + Send + 'static,
    T: Clone + Send + 'static,
{
    let tagged = streams
        .into_iter()
        .enumerate()
        .map(|(slot, s)| s.map(move |item| (slot, item)).boxed());

    stream::select_all(tagged)
        .scan(
            std::array::from_fn::<Option<T>, N, _>(|_| None),
            |latest, (slot, item)| {
                latest[slot] = Some(item);
                let ready = latest
                    .iter()
                    .cloned()
                    .collect::<Option<Vec<T>>>()
                    .and_then(|all| <[T; N]>::try_from(all).ok());
                future::ready(Some(ready))
            },
        )
        .filter_map(future::ready)
        .boxed()
}

/// [`combine_latest`] for two streams of different item types.
pub fn combine_latest2<A, B, SA, SB>(a: SA, b: SB) -> BoxStream<'static, (A, B)>
where
    SA: Stream<Item = A> + Send + 'static,
    SB: Stream<Item = B> + Send + 'static,
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let left = a.map(Either::Left).boxed();
    let right = b.map(Either::Right).boxed();

    stream::select(left, right)
        .scan((None::<A>, None::<B>), |(last_a, last_b), item| {
            match item {
                Either::Left(value) => *last_a = Some(value),
                Either::Right(value) => *last_b = Some(value),
            }
            let ready = match (last_a, last_b) {
                (Some(a), Some(b)) => Some((a.clone(), b.clone())),
                _ => None,
            };
            future::ready(Some(ready))
        })
        .filter_map(future::ready)
        .boxed()
}

enum Slot3<A, B, C> {
    First(A),
    Second(B),
    Third(C),
}

/// [`combine_latest`] for three streams of different item types.
pub fn combine_latest3<A, B, C, SA, SB, SC>(a: SA, b: SB, c: SC) -> BoxStream<'static, (A, B, C)>
where
    SA: Stream<Item = A> + Send + 'static,
    SB: Stream<Item = B> + Send + 'static,
    SC: Stream<Item = C> + Send + 'static,
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
{
    let inputs = vec![
        a.map(Slot3::First).boxed(),
        b.map(Slot3::Second).boxed(),
        c.map(Slot3::Third).boxed(),
    ];

    stream::select_all(inputs)
        .scan(
            (None::<A>, None::<B>, None::<C>),
            |(last_a, last_b, last_c), item| {
                match item {
                    Slot3::First(value) => *last_a = Some(value),
                    Slot3::Second(value) => *last_b = Some(value),
                    Slot3::Third(value) => *last_c = Some(value),
                }
                let ready = match (last_a, last_b, last_c) {
                    (Some(a), Some(b), Some(c)) => Some((a.clone(), b.clone(), c.clone())),
                    _ => None,
                };
                future::ready(Some(ready))
            },
        )
        .filter_map(future::ready)
        .boxed()
}

/// Drop items equal to the one emitted just before.
pub fn distinct_until_changed<S, T>(s: S) -> BoxStream<'static, T>
where
    S: Stream<Item = T> + Send + 'static,
    T: PartialEq + Clone + Send + 'static,
{
    s.scan(None::<T>, |last, item| {
        let fresh = last.as_ref() != Some(&item);
        if fresh {
            *last = Some(item.clone());
        }
        future::ready(Some(fresh.then_some(item)))
    })
    .filter_map(future::ready)
    .boxed()
}

/// Emit `seed` first, then everything from `s`.
pub fn start_with<S, T>(seed: T, s: S) -> BoxStream<'static, T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    stream::once(future::ready(seed)).chain(s).boxed()
}

/// Emit the mean of all items seen so far after each item.
pub fn running_average<S>(s: S) -> BoxStream<'static, f32>
where
    S: Stream<Item = f32> + Send + 'static,
{
    s.scan((0u64, 0.0f64), |(count, sum), value| {
        *count += 1;
        *sum += f64::from(value);
        future::ready(Some((*sum / *count as f64) as f32))
    })
    .boxed()
}

/// Pass items through until one matches `predicate`, emit that one too, then
/// end without waiting for the source.
pub fn complete_by<S, T, P>(s: S, predicate: P) -> BoxStream<'static, T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
    P: FnMut(&T) -> bool + Send + 'static,
{
    stream::unfold(Some((s.boxed(), predicate)), |state| async move {
        let (mut source, mut predicate) = state?;
        let item = source.next().await?;
        let next = if predicate(&item) {
            None
        } else {
            Some((source, predicate))
        };
        Some((item, next))
    })
    .boxed()
}
