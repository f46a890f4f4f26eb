use std::future::Future;
use std::io;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Translates process interrupt/terminate signals into cancellation of a
/// token for as long as the guard is alive.
///
/// Dropping the guard unregisters its handlers and aborts the listener task.
/// With no guard alive, SIGINT and SIGTERM take their default action again.
pub struct SignalGuard {
    #[cfg(unix)]
    _registrations: unix::Registrations,
    listener: JoinHandle<()>,
}

impl SignalGuard {
    /// Registers the handlers before returning. Must be called within a
    /// tokio runtime.
    pub fn install(token: CancellationToken) -> io::Result<Self> {
        #[cfg(unix)]
        {
            let (registrations, shutdown) = unix::register()?;
            Ok(Self {
                _registrations: registrations,
                listener: spawn_listener(token, shutdown),
            })
        }

        #[cfg(not(unix))]
        {
            let shutdown = async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Ctrl-C listener failed: {e}");
                        false
                    }
                }
            };
            Ok(Self {
                listener: spawn_listener(token, shutdown),
            })
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

fn spawn_listener<F>(token: CancellationToken, shutdown: F) -> JoinHandle<()>
where
    F: Future<Output = bool> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            received = shutdown => {
                if received {
                    warn!("Received shutdown signal, cancelling the current job");
                    token.cancel();
                }
            }
        }
    })
}

#[cfg(unix)]
mod unix {
    use std::future::Future;
    use std::io;
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::low_level::{self, pipe};
    use signal_hook::SigId;
    use tokio::io::AsyncReadExt;
    use tracing::warn;

    pub(super) const SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

    /// Guards currently alive in this process.
    static ACTIVE: AtomicUsize = AtomicUsize::new(0);

    pub(super) struct Registrations {
        ids: Vec<SigId>,
        counted: bool,
    }

    impl Drop for Registrations {
        fn drop(&mut self) {
            for id in self.ids.drain(..) {
                let _ = low_level::unregister(id);
            }
            if self.counted {
                ACTIVE.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    /// Registers a self-pipe for every handled signal. The returned future
    /// resolves to `true` once a signal arrives.
    pub(super) fn register() -> io::Result<(Registrations, impl Future<Output = bool>)> {
        install_default_fallback()?;

        let (read, write) = UnixStream::pair()?;
        read.set_nonblocking(true)?;
        write.set_nonblocking(true)?;

        let mut registrations = Registrations {
            ids: Vec::with_capacity(SIGNALS.len()),
            counted: false,
        };
        for signal in SIGNALS {
            registrations
                .ids
                .push(pipe::register(signal, write.try_clone()?)?);
        }
        ACTIVE.fetch_add(1, Ordering::SeqCst);
        registrations.counted = true;

        let mut read = tokio::net::UnixStream::from_std(read)?;
        let shutdown = async move {
            let mut byte = [0u8; 1];
            match read.read(&mut byte).await {
                Ok(n) => n > 0,
                Err(e) => {
                    warn!("Signal pipe failed: {e}");
                    false
                }
            }
        };
        Ok((registrations, shutdown))
    }

    /// Once per process: while no guard is alive, a handled signal gets its
    /// default action.
    fn install_default_fallback() -> io::Result<()> {
        static FALLBACK: OnceLock<Result<(), io::ErrorKind>> = OnceLock::new();

        let installed = *FALLBACK.get_or_init(|| {
            for signal in SIGNALS {
                let action = move || {
                    if ACTIVE.load(Ordering::SeqCst) == 0 {
                        let _ = low_level::emulate_default_handler(signal);
                    }
                };
                // SAFETY: the action only does an atomic load and calls
                // `emulate_default_handler`, both async-signal-safe.
                unsafe { low_level::register(signal, action) }.map_err(|e| e.kind())?;
            }
            Ok(())
        });
        installed.map_err(io::Error::from)
    }
}
