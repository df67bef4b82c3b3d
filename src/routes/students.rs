use crate::{
    auth::RosterSession,
    controller::{Phase, Snapshot},
    data::{
        IdForm,
        record::{BirthDateDisplay, Field, Record},
    },
    error::{IntentError, RosterResult},
    maud_conveniences::{render_table, simple_form_element, subtitle, title},
    screen::{Intent, Screen},
    state::RosterState,
};
use axum::{
    Form,
    body::Body,
    extract::State,
    http::Response,
    response::{IntoResponse, Redirect},
};
use maud::{Markup, html};
use serde::Deserialize;
use uuid::Uuid;

const SCREEN_TARGET: &str = "#students";

pub async fn get_students(State(state): State<RosterState>, session: RosterSession) -> Response<Body> {
    let Some(user) = session.user else {
        return Redirect::to("/login?to=/students").into_response();
    };

    state.render(Some(&user), html! {
        div class="mx-auto bg-gray-800 p-8 rounded shadow-md max-w-5xl w-full flex flex-col space-y-4" {
            div hx-ext="sse" sse-connect="/sse_feed" class="flex flex-col space-y-4" {
                div id="notices" sse-swap="notice" hx-swap="afterbegin" class="fixed top-4 right-4 w-80" {}
                div id="students" hx-get="/internal/students" hx-trigger="load, sse:screen_changed, sse:exited" {}
            }
        }
    }).into_response()
}

/// The whole screen, as htmx swaps it into `#students`.
pub async fn internal_get_students(
    State(state): State<RosterState>,
    session: RosterSession,
) -> RosterResult<Response<Body>> {
    let Some(user) = session.user else {
        return Ok(signed_out());
    };

    let screen = state.screen_for(&user).await?;
    Ok(render_screen(&screen.snapshot().await, None).into_response())
}

async fn dispatch(
    state: &RosterState,
    session: RosterSession,
    intents: impl IntoIterator<Item = Intent>,
) -> RosterResult<Response<Body>> {
    let Some(user) = session.user else {
        return Ok(signed_out());
    };

    let screen = state.screen_for(&user).await?;
    let problem = apply(&screen, intents).await.err().map(|e| {
        warn!(?e, user_id = %user.id, "intent refused");
        match e {
            IntentError::Invalid { source } => source.to_string(),
            e => e.to_string(),
        }
    });

    Ok(render_screen(&screen.snapshot().await, problem.as_deref()).into_response())
}

async fn apply(screen: &Screen, intents: impl IntoIterator<Item = Intent>) -> Result<(), IntentError> {
    for intent in intents {
        screen.dispatch(intent).await?;
    }
    Ok(())
}

fn signed_out() -> Response<Body> {
    ([("HX-Redirect", "/login?to=/students")], "").into_response()
}

pub async fn internal_post_open_create(
    State(state): State<RosterState>,
    session: RosterSession,
) -> RosterResult<Response<Body>> {
    dispatch(&state, session, [Intent::OpenCreate]).await
}

pub async fn internal_post_open_edit(
    State(state): State<RosterState>,
    session: RosterSession,
    Form(IdForm { id }): Form<IdForm>,
) -> RosterResult<Response<Body>> {
    dispatch(&state, session, [Intent::OpenEdit(id)]).await
}

pub async fn internal_post_cancel(
    State(state): State<RosterState>,
    session: RosterSession,
) -> RosterResult<Response<Body>> {
    dispatch(&state, session, [Intent::Cancel]).await
}

#[derive(Deserialize)]
pub struct DraftForm {
    full_name: String,
    registration_number: String,
    email: String,
    birth_date: String,
}

impl DraftForm {
    fn into_intents(self) -> [Intent; 5] {
        [
            Intent::EditField(Field::FullName, self.full_name),
            Intent::EditField(Field::RegistrationNumber, self.registration_number),
            Intent::EditField(Field::Email, self.email),
            Intent::EditField(Field::BirthDate, self.birth_date),
            Intent::Submit,
        ]
    }
}

pub async fn internal_post_submit(
    State(state): State<RosterState>,
    session: RosterSession,
    Form(draft): Form<DraftForm>,
) -> RosterResult<Response<Body>> {
    dispatch(&state, session, draft.into_intents()).await
}

pub async fn internal_post_request_delete(
    State(state): State<RosterState>,
    session: RosterSession,
    Form(IdForm { id }): Form<IdForm>,
) -> RosterResult<Response<Body>> {
    dispatch(&state, session, [Intent::RequestDelete(id)]).await
}

pub async fn internal_post_confirm_delete(
    State(state): State<RosterState>,
    session: RosterSession,
) -> RosterResult<Response<Body>> {
    dispatch(&state, session, [Intent::ConfirmDelete]).await
}

pub async fn internal_post_cancel_delete(
    State(state): State<RosterState>,
    session: RosterSession,
) -> RosterResult<Response<Body>> {
    dispatch(&state, session, [Intent::CancelDelete]).await
}

pub async fn internal_post_refresh(
    State(state): State<RosterState>,
    session: RosterSession,
) -> RosterResult<Response<Body>> {
    dispatch(&state, session, [Intent::Refresh]).await
}

fn action_button(label: &str, endpoint: &str, id: Option<Uuid>, enabled: bool, colour: &str) -> Markup {
    html! {
        button type="button" hx-post=(endpoint) hx-target=(SCREEN_TARGET)
            hx-vals=[id.map(|id| format!("{{\"id\": \"{id}\"}}"))]
            disabled[!enabled]
            class={"font-bold py-1 px-3 rounded disabled:opacity-50 " (colour)} {
            (label)
        }
    }
}

fn render_rows(snapshot: &Snapshot) -> Markup {
    let idle = matches!(snapshot.phase, Phase::Idle);

    if snapshot.records.is_empty() {
        return html! {
            p class="text-gray-400 italic" {
                @if matches!(snapshot.phase, Phase::Loading) {
                    "Loading students…"
                } @else {
                    "No students yet. Add one to get started."
                }
            }
        };
    }

    render_table(
        ["Name", "Registration number", "Email", "Birth date", "Actions"],
        snapshot.records.iter().map(|Record { id, fields, .. }| {
            [
                html! {(fields.full_name)},
                html! {(fields.registration_number)},
                html! {(fields.email)},
                html! {(BirthDateDisplay(&fields.birth_date))},
                html! {
                    div class="flex flex-row space-x-2" {
                        (action_button("Edit", "/internal/students/open_edit", Some(*id), idle, "bg-blue-500 hover:bg-blue-700"))
                        (action_button("Delete", "/internal/students/request_delete", Some(*id), idle, "bg-red-600 hover:bg-red-800"))
                    }
                },
            ]
        }),
    )
}

fn render_delete_prompt(snapshot: &Snapshot) -> Option<Markup> {
    let (id, deleting) = match snapshot.phase {
        Phase::ConfirmingDelete { id } => (id, false),
        Phase::Deleting { id, .. } => (id, true),
        _ => return None,
    };
    let name = snapshot
        .records
        .iter()
        .find(|record| record.id == id)
        .map_or("this student", |record| record.fields.full_name.as_str());

    Some(html! {
        div role="alertdialog" class="bg-gray-700 border border-red-500 rounded p-4" {
            p class="mb-4" {"Are you sure you want to delete " strong {(name)} "?"}
            div class="flex flex-row space-x-4" {
                @if deleting {
                    span class="text-gray-300" {"Deleting…"}
                } @else {
                    (action_button("Yes, delete", "/internal/students/confirm_delete", None, true, "bg-red-600 hover:bg-red-800"))
                    (action_button("Keep", "/internal/students/cancel_delete", None, true, "bg-gray-600 hover:bg-gray-800"))
                }
            }
        }
    })
}

fn render_form(snapshot: &Snapshot) -> Option<Markup> {
    let (form, submitting) = snapshot.phase.form()?;

    Some(html! {
        div class="fixed inset-0 bg-black/60 flex items-center justify-center" {
            div role="dialog" class="bg-gray-800 rounded shadow-md p-6 w-full max-w-md" {
                @if form.target.is_some() {
                    (title("Edit student"))
                } @else {
                    (title("Add student"))
                }

                form hx-post="/internal/students/submit" hx-target=(SCREEN_TARGET) hx-trigger="submit" {
                    @for field in Field::ALL {
                        (simple_form_element(field.name(), field.label(), true, Some(field.input_type()), Some(form.draft.get(field))))
                    }

                    div class="flex items-center justify-end space-x-4" {
                        (action_button("Cancel", "/internal/students/cancel", None, true, "bg-gray-600 hover:bg-gray-800"))
                        button type="submit" disabled[submitting] class="bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded disabled:opacity-50" {
                            (form.submit_label(submitting))
                        }
                    }
                }
            }
        }
    })
}

pub fn render_screen(snapshot: &Snapshot, problem: Option<&str>) -> Markup {
    if matches!(snapshot.phase, Phase::Exited) {
        return html! {
            div class="text-center" {
                (title("Session ended"))
                p { "You have been signed out. " a href="/login?to=/students" class="underline" {"Log in again"} }
            }
        };
    }

    let idle = matches!(snapshot.phase, Phase::Idle);

    html! {
        div class="flex flex-col space-y-4" {
            div class="flex flex-row items-center justify-between" {
                div {
                    (title("My students"))
                    (subtitle(format!("Welcome, {}", snapshot.identity.label)))
                }
                div class="flex flex-row space-x-2" {
                    (action_button("Refresh", "/internal/students/refresh", None, idle, "bg-slate-600 hover:bg-slate-800"))
                    (action_button("Add student", "/internal/students/open_create", None, idle, "bg-green-600 hover:bg-green-800"))
                }
            }

            @if let Some(problem) = problem {
                div role="alert" class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded" {
                    (problem)
                }
            }

            @if let Some(prompt) = render_delete_prompt(snapshot) {
                (prompt)
            }

            (render_rows(snapshot))

            @if let Some(form) = render_form(snapshot) {
                (form)
            }
        }
    }
}
