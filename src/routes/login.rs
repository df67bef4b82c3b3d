use crate::{
    auth::{RosterSession, backend::RosterAuthCredentials},
    data::user::User,
    error::{EmailSnafu, RosterResult},
    maud_conveniences::{form_submit_button, simple_form_element, subtitle, title},
    state::RosterState,
};
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use email_address::EmailAddress;
use maud::{Markup, html};
use secrecy::SecretString;
use serde::Deserialize;
use snafu::ResultExt;
use std::str::FromStr;

const DEFAULT_NEXT: &str = "/students";

//only ever bounce to our own pages
fn sanitise_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") => next,
        _ => DEFAULT_NEXT,
    }
}

fn failed_login_redirect(next: Option<&str>) -> String {
    match next {
        Some(next) => format!("/login?login_failed=true&to={}", urlencoding::encode(next)),
        None => "/login?login_failed=true".to_string(),
    }
}

fn failure_alert(message: &str) -> Markup {
    html! {
        div role="alert" class="bg-red-100 border border-red-400 text-red-700 px-4 py-4 rounded relative" {
            strong class="font-bold" {"Alert!"}
            br;
            span class="block sm:inline" {(message)}
        }
        br;
    }
}

#[derive(Deserialize)]
pub struct LoginOptions {
    pub to: Option<String>,
    pub login_failed: Option<bool>,
}

pub async fn get_login(
    State(state): State<RosterState>,
    session: RosterSession,
    Query(LoginOptions { to, login_failed }): Query<LoginOptions>,
) -> Response {
    if session.user.is_some() {
        return Redirect::to(sanitise_next(to.as_deref())).into_response();
    }

    state.render(None, html! {
        div class="bg-gray-800 shadow-md rounded px-8 pt-6 pb-8 mb-4 w-full max-w-sm" {
            (title("Login"))
            @if login_failed.unwrap_or(false) {
                // avoid giving extra details for security reasons :)
                (failure_alert("Email/Password not found or password incorrect"))
            }

            form method="post" {
                @if let Some(to) = to {
                    input type="hidden" name="next" value=(to) {}
                }
                (simple_form_element("email", "Email", true, Some("email"), None))
                (simple_form_element("password", "Password", true, Some("password"), None))
                (form_submit_button(Some("Login")))
            }
            (subtitle(html! { "No account yet? " a href="/register" class="underline" {"Sign up"} }))
        }
    }).into_response()
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: SecretString,
    next: Option<String>,
}

pub async fn post_login(
    State(state): State<RosterState>,
    mut session: RosterSession,
    Form(LoginForm {
        email,
        password,
        next,
    }): Form<LoginForm>,
) -> RosterResult<Redirect> {
    let Some(user) = session
        .authenticate(RosterAuthCredentials::EmailPassword { email, password })
        .await?
    else {
        return Ok(Redirect::to(&failed_login_redirect(next.as_deref())));
    };

    session.login(&user).await?;
    info!(user_id = %user.id, "logged in");
    state.sessions().publish(user.id, Some(user.identity()));

    Ok(Redirect::to(sanitise_next(next.as_deref())))
}

pub async fn post_logout(
    State(state): State<RosterState>,
    mut session: RosterSession,
) -> RosterResult<impl IntoResponse> {
    if let Some(user) = session.logout().await? {
        info!(user_id = %user.id, "logged out");
        state.sessions().publish(user.id, None);
        state.screens().unmount(user.id).await;
    }
    Ok(Redirect::to("/"))
}

#[derive(Deserialize)]
pub struct RegisterOptions {
    pub email_taken: Option<bool>,
}

pub async fn get_register(
    State(state): State<RosterState>,
    session: RosterSession,
    Query(RegisterOptions { email_taken }): Query<RegisterOptions>,
) -> Response {
    if session.user.is_some() {
        return Redirect::to(DEFAULT_NEXT).into_response();
    }

    state.render(None, html! {
        div class="bg-gray-800 shadow-md rounded px-8 pt-6 pb-8 mb-4 w-full max-w-sm" {
            (title("Sign up"))
            @if email_taken.unwrap_or(false) {
                (failure_alert("That email already has an account"))
            }

            form method="post" {
                (simple_form_element("email", "Email", true, Some("email"), None))
                (simple_form_element("display_name", "Display Name", false, None, None))
                (simple_form_element("password", "Password", true, Some("password"), None))
                (form_submit_button(Some("Sign up")))
            }
        }
    }).into_response()
}

#[derive(Deserialize)]
pub struct RegisterForm {
    email: String,
    display_name: String,
    password: SecretString,
}

pub async fn post_register(
    State(state): State<RosterState>,
    mut session: RosterSession,
    Form(RegisterForm {
        email,
        display_name,
        password,
    }): Form<RegisterForm>,
) -> RosterResult<Redirect> {
    let email = EmailAddress::from_str(email.trim()).context(EmailSnafu)?;
    let display_name = Some(display_name.trim().to_string()).filter(|name| !name.is_empty());

    let mut conn = state.get_connection().await?;
    if User::get_from_db_by_email(email.as_str(), &mut conn)
        .await?
        .is_some()
    {
        return Ok(Redirect::to("/register?email_taken=true"));
    }

    let id = User::insert_into_database(email, display_name, password, &mut conn).await?;
    info!(user_id = %id, "new account registered");

    if let Some(user) = User::get_from_db_by_id(id, &mut conn).await? {
        session.login(&user).await?;
        state.sessions().publish(user.id, Some(user.identity()));
    }

    Ok(Redirect::to(DEFAULT_NEXT))
}
