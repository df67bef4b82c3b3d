use crate::{auth::RosterSession, state::RosterState};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use maud::html;

pub async fn get_index_route(State(state): State<RosterState>, session: RosterSession) -> Response {
    if session.user.is_some() {
        return Redirect::to("/students").into_response();
    }

    state
        .render(
            None,
            html! {
                div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full" {
                    h1 class="text-2xl font-semibold mb-6 text-center" {
                        "Roster"
                    }
                    p class="text-gray-300 mb-6 text-center" {
                        "Keep track of the students you look after."
                    }

                    div class="flex flex-row space-x-4 justify-center" {
                        a href="/login" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {
                            "Log in"
                        }
                        a href="/register" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {
                            "Sign up"
                        }
                    }
                }
            },
        )
        .into_response()
}
