//! Navigation gating and routing.
//!
//! `NavigationGate` answers one question per attempt: may this protected
//! view be entered with the current session? Denials carry a redirect to
//! `/login` with the requested location as `returnUrl`. `Router` applies
//! the gate to the application's route table.

pub mod gate;
pub mod routes;

pub use gate::{
    GateDecision, LoginRedirect, NavigationGate, PendingIntent, DEFAULT_DESTINATION, LOGIN_PATH,
    RETURN_URL_PARAM,
};
pub use routes::{Landing, Navigation, NavigationError, Router, View};
