//! A fixed pool of worker threads for running one closure on every worker.
use std::{
    io,
    num::NonZeroUsize,
    sync::{mpsc, Condvar, Mutex},
    thread::{self, available_parallelism, JoinHandle},
};

pub struct Threads {
    senders: Vec<mpsc::Sender<Job<'static>>>,
    handles: Vec<JoinHandle<()>>,
}

impl Threads {
    pub fn new(n_threads: NonZeroUsize) -> io::Result<Threads> {
        let n_threads = n_threads.get();
        let mut res = Threads {
            senders: Vec::with_capacity(n_threads),
            handles: Vec::with_capacity(n_threads),
        };
        for i in 0..n_threads {
            let (sender, receiver) = mpsc::channel::<Job>();
            let handle = thread::Builder::new().name(format!("worker-{i}")).spawn(move || {
                for job in receiver {
                    (job.f)()
                }
            })?;
            res.senders.push(sender);
            res.handles.push(handle)
        }
        log::debug!("spawned {n_threads} worker threads");
        Ok(res)
    }

    pub fn with_max_threads() -> io::Result<Threads> {
        let n_threads = available_parallelism()?;
        Threads::new(n_threads)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Runs `f` once on every worker and blocks until all of them return.
    ///
    /// `f` may borrow from the caller's stack: the jobs hold a guard that
    /// keeps this call from returning while any of them is alive.
    pub fn in_parallel<'a>(&self, f: &'a (dyn Fn() + Sync)) {
        let job_count = JobCount::new();
        for s in &self.senders {
            let job = Job { f, _g: job_count.inc() };
            // Workers only exit once their sender is dropped.
            s.send(unsafe { job.erase_lifetime() }).unwrap()
        }
    }
}

impl Drop for Threads {
    fn drop(&mut self) {
        self.senders.clear();
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

struct Job<'a> {
    f: &'a (dyn Fn() + Sync),
    _g: JobGuard<'a>,
}

struct JobCount {
    mux: Mutex<usize>,
    cv: Condvar,
}

struct JobGuard<'a> {
    count: &'a JobCount,
}

impl<'a> Job<'a> {
    unsafe fn erase_lifetime(self) -> Job<'static> {
        std::mem::transmute(self)
    }
}

impl JobCount {
    fn new() -> JobCount {
        JobCount { mux: Mutex::new(0), cv: Condvar::new() }
    }
    fn inc(&self) -> JobGuard<'_> {
        *self.mux.lock().unwrap() += 1;
        JobGuard { count: self }
    }
    fn dec(&self) {
        let mut g = self.mux.lock().unwrap();
        *g -= 1;
        if *g == 0 {
            self.cv.notify_all()
        }
    }
}

impl Drop for JobCount {
    fn drop(&mut self) {
        let mut g = self.mux.lock().unwrap();
        while *g > 0 {
            g = self.cv.wait(g).unwrap();
        }
    }
}

impl<'a> Drop for JobGuard<'a> {
    fn drop(&mut self) {
        self.count.dec()
    }
}
