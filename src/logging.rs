//! Request logging.
//!
//! Every request gets a sequence number when it arrives. The arrival line and the
//! response line share that number, so interleaved requests can be told apart.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use log::{info, log, warn, Level};
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Status, StatusClass},
    Data, Orbit, Request, Response, Rocket,
};

/// Sequence number and arrival time of one request.
#[derive(Debug, Clone, Copy)]
pub struct RequestTrace {
    pub seq: usize,
    arrived: Instant,
}

impl RequestTrace {
    fn arrive() -> Self {
        static SEQ: AtomicUsize = AtomicUsize::new(0);
        Self {
            seq: SEQ.fetch_add(1, Ordering::Relaxed),
            arrived: Instant::now(),
        }
    }

    /// The request's trace, created on first use.
    pub fn of<'r>(req: &'r Request<'_>) -> &'r Self {
        req.local_cache(Self::arrive)
    }

    pub fn elapsed(&self) -> Duration {
        self.arrived.elapsed()
    }
}

/// Server faults are errors, client faults are warnings, the rest is routine.
fn level_for(status: Status) -> Level {
    match status.class() {
        StatusClass::ServerError => Level::Error,
        StatusClass::ClientError => Level::Warn,
        _ => Level::Info,
    }
}

/// The handler that served a request, or a marker if none matched.
fn handler_name(req: &Request<'_>) -> String {
    match req.route() {
        Some(route) => match &route.name {
            Some(name) => format!("{name} ({})", route.uri),
            None => route.uri.to_string(),
        },
        None => "no matching route".to_string(),
    }
}

/// Logs each request on arrival and on response, with the time spent handling it.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let scheme = if config.tls_enabled() { "https" } else { "http" };
        info!("Listening on {scheme}://{}:{}", config.address, config.port);
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let trace = RequestTrace::of(req);
        info!("#{} {} {}", trace.seq, req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let trace = RequestTrace::of(req);
        let status = res.status();
        log!(
            level_for(status),
            "#{} {} from {} after {}ms",
            trace.seq,
            status,
            handler_name(req),
            trace.elapsed().as_millis()
        );
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutting down, finishing in-flight requests");
    }
}
