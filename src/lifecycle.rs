//! Process lifecycle: phases, termination signals, bounded drain.
//!
//! ```text
//! Starting ──bind + signals──▶ Serving ──signal──▶ Draining ─┬─ all done ──▶ Terminated
//!                                                            └─ deadline ──▶ ForcedExit
//! ```
//!
//! Draining stops admission first (the listener is dropped), then races the
//! in-flight connection tasks against a single grace-period timer. Whichever
//! finishes first decides the [`Outcome`]; a stuck handler can delay exit by
//! at most the grace period.

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info};

/// How long in-flight requests get once a termination signal arrives.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Serving,
    Draining,
    Terminated,
    ForcedExit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starting   => "starting",
            Self::Serving    => "serving",
            Self::Draining   => "draining",
            Self::Terminated => "terminated",
            Self::ForcedExit => "forced-exit",
        })
    }
}

/// How serving ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every in-flight request finished inside the grace period.
    Terminated,
    /// The grace period ran out; remaining connections were abandoned.
    ForcedExit,
}

impl Outcome {
    pub fn phase(self) -> Phase {
        match self {
            Self::Terminated => Phase::Terminated,
            Self::ForcedExit => Phase::ForcedExit,
        }
    }

    pub fn is_clean(self) -> bool {
        self == Self::Terminated
    }
}

// ── Signals ───────────────────────────────────────────────────────────────────

/// Termination signals, registered up front so a failure to install them
/// surfaces during startup rather than at shutdown.
///
/// SIGHUP, SIGINT, SIGTERM and SIGQUIT are all treated as "stop". Outside
/// Unix only Ctrl-C is available.
pub struct Signals {
    #[cfg(unix)]
    streams: [(tokio::signal::unix::Signal, &'static str); 4],
}

impl Signals {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            streams: [
                (signal(SignalKind::hangup())?, "SIGHUP"),
                (signal(SignalKind::interrupt())?, "SIGINT"),
                (signal(SignalKind::terminate())?, "SIGTERM"),
                (signal(SignalKind::quit())?, "SIGQUIT"),
            ],
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Resolves with the name of the first termination signal received.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        let [(hup, a), (int, b), (term, c), (quit, d)] = &mut self.streams;
        tokio::select! {
            _ = hup.recv()  => *a,
            _ = int.recv()  => *b,
            _ = term.recv() => *c,
            _ = quit.recv() => *d,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "ctrl-c",
            Err(e) => {
                error!("ctrl-c handler failed: {e}");
                std::future::pending().await
            }
        }
    }
}

// ── Drain ─────────────────────────────────────────────────────────────────────

/// Waits for every task in `tasks` to finish, for at most `grace`.
///
/// On deadline the remaining tasks are aborted, which drops their
/// connections mid-response.
pub(crate) async fn drain(tasks: &mut JoinSet<()>, grace: Duration) -> Outcome {
    let in_flight = tasks.len();
    let all_done = async {
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                if e.is_panic() {
                    error!("connection task panicked during drain: {e}");
                }
            }
        }
    };
    let drained = tokio::time::timeout(grace, all_done).await;

    match drained {
        Ok(()) => {
            info!(phase = %Phase::Terminated, "all in-flight requests completed");
            Outcome::Terminated
        }
        Err(_) => {
            let abandoned = tasks.len();
            tasks.abort_all();
            error!(
                phase = %Phase::ForcedExit,
                in_flight,
                abandoned,
                grace_ms = grace.as_millis() as u64,
                "graceful shutdown timed out, forcing exit"
            );
            Outcome::ForcedExit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn drain_finishes_cleanly_when_work_completes_in_time() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { tokio::time::sleep(Duration::from_millis(20)).await });

        let outcome = drain(&mut tasks, Duration::from_secs(5)).await;
        assert_eq!(outcome, Outcome::Terminated);
        assert!(outcome.is_clean());
    }

    #[tokio::test]
    async fn drain_is_bounded_by_the_grace_period() {
        let mut tasks = JoinSet::new();
        tasks.spawn(std::future::pending::<()>());

        let started = Instant::now();
        let outcome = drain(&mut tasks, Duration::from_millis(100)).await;

        assert_eq!(outcome, Outcome::ForcedExit);
        assert_eq!(outcome.phase(), Phase::ForcedExit);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn empty_drain_is_immediate() {
        let mut tasks = JoinSet::new();
        assert_eq!(drain(&mut tasks, Duration::ZERO).await, Outcome::Terminated);
    }
}
