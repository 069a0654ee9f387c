// src/api/pages.rs
//
// Browser pages. Which page a visitor gets depends only on the session state.

use actix_web::{get, web, HttpResponse, Responder};

use crate::api::auth::see_other;
use crate::session::SessionState;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Signup,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Render,
    Loading,
    Redirect(&'static str),
}

pub fn gate(route: Route, state: &SessionState) -> Gate {
    if state.loading {
        return Gate::Loading;
    }
    let signed_in = state.identity.is_some();
    match route {
        Route::Login | Route::Signup if signed_in => Gate::Redirect("/dashboard"),
        Route::Dashboard if !signed_in => Gate::Redirect("/login"),
        _ => Gate::Render,
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html(title: &str, body: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(format!(
            "<!doctype html><html><head><meta charset=\"utf-8\"><title>{} | Thumbnails Labs</title></head><body>{body}</body></html>",
            escape(title)
        ))
}

fn loading_page() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .insert_header(("Refresh", "1"))
        .body("<!doctype html><html><body><p>Loading...</p></body></html>")
}

fn render(route: Route, state: &AppState, page: impl FnOnce(&SessionState) -> HttpResponse) -> HttpResponse {
    let session = state.session.current();
    match gate(route, &session) {
        Gate::Render => page(&session),
        Gate::Loading => loading_page(),
        Gate::Redirect(to) => see_other(to),
    }
}

fn sign_in_page(title: &str, session: &SessionState, provider: &str) -> HttpResponse {
    let flash = session
        .error
        .as_deref()
        .map(|e| format!("<p class=\"error\">{}</p>", escape(e)))
        .unwrap_or_default();
    html(
        title,
        &format!(
            "<h1>{}</h1>{flash}<a href=\"/auth/{provider}\">Continue with {provider}</a>",
            escape(title)
        ),
    )
}

#[get("/")]
pub async fn home(state: web::Data<AppState>) -> impl Responder {
    render(Route::Home, &state, |session| {
        let cta = if session.identity.is_some() {
            "<a href=\"/dashboard\">Go to dashboard</a>"
        } else {
            "<a href=\"/signup\">Get started</a> <a href=\"/login\">Log in</a>"
        };
        html(
            "AI thumbnails",
            &format!("<h1>Thumbnails from a title, an image or a YouTube link</h1>{cta}"),
        )
    })
}

#[get("/login")]
pub async fn login(state: web::Data<AppState>) -> impl Responder {
    let provider = state.config.oauth_provider.clone();
    render(Route::Login, &state, |session| {
        sign_in_page("Welcome back", session, &provider)
    })
}

#[get("/signup")]
pub async fn signup(state: web::Data<AppState>) -> impl Responder {
    let provider = state.config.oauth_provider.clone();
    render(Route::Signup, &state, |session| {
        sign_in_page("Create your account", session, &provider)
    })
}

#[get("/dashboard")]
pub async fn dashboard(state: web::Data<AppState>) -> impl Responder {
    let overview = state.dashboard.overview();
    render(Route::Dashboard, &state, |_| {
        let credits = overview
            .credits
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let recent: String = overview
            .recent
            .iter()
            .map(|g| format!("<img src=\"{}\" width=\"240\">", escape(&g.output_image_url)))
            .collect();
        html(
            "Dashboard",
            &format!(
                "<header><span id=\"email\">{}</span> <span id=\"credits\">{credits}</span> credits\
                 <form method=\"post\" action=\"/auth/logout\"><button>Sign out</button></form></header>\
                 <section id=\"recent\">{recent}</section>\
                 <script>new WebSocket(location.origin.replace(/^http/, 'ws') + '/ws').onmessage = () => location.reload();</script>",
                escape(overview.email.as_deref().unwrap_or_default())
            ),
        )
    })
}
