use crate::{
    auth::RosterSession,
    controller::{Notice, NoticeLevel},
    error::{AuthError, RosterResult},
    screen::ScreenEvent,
    state::RosterState,
};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use maud::{Markup, html};
use std::convert::Infallible;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

fn render_notice(notice: &Notice) -> Markup {
    let colours = match notice.level {
        NoticeLevel::Success => "bg-green-100 border-green-400 text-green-800",
        NoticeLevel::Error => "bg-red-100 border-red-400 text-red-700",
    };

    html! {
        div role="status" class={"border px-4 py-2 rounded shadow mb-2 " (colours)} {
            (notice.message)
        }
    }
}

fn to_sse_event(event: &ScreenEvent) -> Event {
    let data = match event {
        ScreenEvent::Notice(notice) => render_notice(notice).into_string(),
        ScreenEvent::Changed | ScreenEvent::Exited => String::new(),
    };
    Event::default().event(event.name()).data(data)
}

/// Re-broadcasts the logged-in user's screen events for htmx's sse extension.
pub async fn sse_feed(
    State(state): State<RosterState>,
    session: RosterSession,
) -> RosterResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let Some(user) = session.user else {
        return Err(AuthError::NoSession.into());
    };

    let screen = state.screen_for(&user).await?;
    let stream = BroadcastStream::new(screen.subscribe()).map(|event| {
        Ok(match event {
            Ok(event) => to_sse_event(&event),
            //missed some, so get the page to redraw from scratch
            Err(_) => to_sse_event(&ScreenEvent::Changed),
        })
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
