/// Milestones of a shake run.
#[derive(Debug, Clone, PartialEq)]
pub enum ShakeEvent {
    /// Molecules were selected and the starting energy evaluated.
    Started { n_targets: usize, initial_energy: f64 },

    /// A distribution cycle finished, having handed out `n_distributed` of the `n_targets`
    /// molecules so far.
    CycleComplete {
        cycle: usize,
        n_distributed: usize,
        n_targets: usize,
    },

    Finished { n_cycles: usize, final_energy: f64 },
}

impl ShakeEvent {
    /// Fraction of the targeted molecules handed out so far.
    pub fn fraction_done(&self) -> f64 {
        match *self {
            ShakeEvent::Started { .. } => 0.0,
            ShakeEvent::CycleComplete {
                n_distributed,
                n_targets,
                ..
            } if n_targets > 0 => n_distributed as f64 / n_targets as f64,
            ShakeEvent::CycleComplete { .. } | ShakeEvent::Finished { .. } => 1.0,
        }
    }
}

/// Receives [`ShakeEvent`]s as a shake run advances. Closures taking an event qualify.
///
/// Every process calls its own observer, so usually only the pool master passes one.
pub trait ShakeObserver: Sync {
    fn notify(&self, event: ShakeEvent);
}

impl<F: Fn(ShakeEvent) + Sync> ShakeObserver for F {
    fn notify(&self, event: ShakeEvent) {
        self(event)
    }
}

pub(crate) fn notify(observer: Option<&dyn ShakeObserver>, event: ShakeEvent) {
    if let Some(observer) = observer {
        observer.notify(event);
    }
}
