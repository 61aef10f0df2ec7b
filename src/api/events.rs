//! Live notification stream and revision polling.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use super::{error, success, ApiResult};
use crate::auth::Session;
use crate::db::RevisionInfo;
use crate::models::Role;
use crate::notify::{HubMessage, Notification};
use crate::AppState;

/// GET /api/events - Server-sent notifications for the caller.
///
/// Emits `notification` events addressed to the caller and `refresh` events
/// naming the table that changed.
pub async fn stream_events(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(user_id = %session.user_id, "Event stream opened");

    let stream = BroadcastStream::new(state.hub.subscribe()).filter_map(move |message| {
        let event = match message {
            Ok(HubMessage::Notification(n)) if addressed_to(&session, &n) => {
                Event::default().event("notification").json_data(&n).ok()
            }
            Ok(HubMessage::Notification(_)) => None,
            Ok(HubMessage::Refresh(hint)) => Event::default().event("refresh").json_data(&hint).ok(),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(user_id = %session.user_id, skipped, "Event stream lagged");
                None
            }
        };
        std::future::ready(event.map(Ok))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/revision - Current revision info for cheap polling.
pub async fn get_revision(State(state): State<AppState>) -> ApiResult<RevisionInfo> {
    match state.repo.get_revision_info().await {
        Ok(info) => {
            let revision_id = info.revision_id;
            success(info, revision_id)
        }
        Err(e) => error(e, 0),
    }
}

/// Admins receive everything; other roles only what names them.
pub fn addressed_to(session: &Session, notification: &Notification) -> bool {
    let names = |mine: &Option<String>, theirs: &Option<String>| {
        mine.is_some() && mine.as_deref() == theirs.as_deref()
    };
    match session.role {
        Role::Admin => true,
        Role::Staff => names(&session.staff_id, &notification.data.staff_id),
        Role::Outlet => names(&session.outlet_id, &notification.data.outlet_id),
    }
}
