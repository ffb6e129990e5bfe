use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

pub trait Worker<T>: Sync
where
    T: Send,
{
    type Out: Send;

    fn proc(&self, input: T) -> Self::Out;

    fn para<I>(&self, in_v: I, n_threads: usize) -> Vec<Self::Out>
    where
        I: Iterator<Item = T>,
        Self: Sized,
    {
        para_run(in_v, self, n_threads)
    }
}

pub enum QueIn<T> {
    Go(T),
    Poison,
}

/// Runs `setup.proc` on every input across `n_threads` threads.
/// Outputs come back in input order.
pub fn para_run<W, T, I>(in_v: I, setup: &W, n_threads: usize) -> Vec<W::Out>
where
    W: Worker<T>,
    I: Iterator<Item = T>,
    T: Send,
{
    let n_threads = n_threads.max(1);
    let capacity = n_threads * 100;

    let (sender, r) = bounded(capacity);
    let (out_sender, out_r) = unbounded();

    std::thread::scope(|s| {
        for _ in 0..n_threads {
            let in_clone = r.clone();
            let out_clone = out_sender.clone();
            s.spawn(move || subf(in_clone, out_clone, setup));
        }

        for e in in_v.enumerate() {
            if sender.send(QueIn::Go(e)).is_err() {
                break;
            }
        }
        for _ in 0..n_threads {
            if sender.send(QueIn::Poison).is_err() {
                break;
            }
        }
    });
    drop(out_sender);

    let mut outs: Vec<(usize, W::Out)> = out_r.iter().collect();
    outs.sort_by_key(|e| e.0);
    outs.into_iter().map(|e| e.1).collect()
}

fn subf<W, T>(r: Receiver<QueIn<(usize, T)>>, out: Sender<(usize, W::Out)>, s: &W)
where
    W: Worker<T>,
    T: Send,
{
    while let Ok(QueIn::Go((i, qc_in))) = r.recv() {
        if out.send((i, s.proc(qc_in))).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Squarer {
        calls: AtomicUsize,
    }

    impl Worker<u64> for Squarer {
        type Out = u64;
        fn proc(&self, input: u64) -> u64 {
            self.calls.fetch_add(1, Ordering::Relaxed);
            input * input
        }
    }

    #[test]
    fn keeps_input_order() {
        let w = Squarer {
            calls: AtomicUsize::new(0),
        };
        let out = w.para(0..1000u64, 4);
        assert_eq!(out, (0..1000u64).map(|e| e * e).collect::<Vec<_>>());
        assert_eq!(w.calls.load(Ordering::Relaxed), 1000);
    }

    #[test]
    fn single_thread_and_empty() {
        let w = Squarer {
            calls: AtomicUsize::new(0),
        };
        assert_eq!(para_run(vec![3u64, 2].into_iter(), &w, 1), vec![9, 4]);
        assert!(para_run(std::iter::empty::<u64>(), &w, 0).is_empty());
    }
}
