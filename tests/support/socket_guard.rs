//! Skips wiremock-backed tests in sandboxes that cannot bind localhost.
//!
//! Set `TIKFETCH_REQUIRE_SOCKET_TESTS=1` to turn a skip into a failure.

use std::net::TcpListener;
use std::panic::Location;
use std::sync::OnceLock;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "TIKFETCH_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn can_bind_localhost() -> bool {
    static CAN_BIND: OnceLock<bool> = OnceLock::new();
    *CAN_BIND.get_or_init(|| TcpListener::bind("127.0.0.1:0").is_ok())
}

/// True when the calling test should return without running.
#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if can_bind_localhost() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] {}:{} needs a localhost socket, which this environment refuses",
        location.file(),
        location.line()
    );
    assert!(!sockets_required(), "{message}. Unset {REQUIRE_ENV} to allow skipping.");
    eprintln!("{message}. Skipping.");
    true
}

pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}

/// Value a skipped test returns, whatever its return type.
pub trait SocketSkipReturn {
    fn socket_skip_return() -> Self;
}

impl SocketSkipReturn for () {
    fn socket_skip_return() -> Self {}
}

impl<E> SocketSkipReturn for Result<(), E> {
    fn socket_skip_return() -> Self {
        Ok(())
    }
}

pub fn socket_skip_return<T: SocketSkipReturn>() -> T {
    T::socket_skip_return()
}
