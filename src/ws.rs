// src/ws.rs
//
// Browser push: every open dashboard tab holds a socket to /ws and receives
// dashboard changes as `{"event": ..., "data": ...}` text frames.

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Recipient};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::Generation;
use crate::AppState;

static NEXT_SESSION_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Message)]
#[rtype(result = "()")]
struct WsMessage(pub String);

#[derive(Message)]
#[rtype(result = "()")]
struct Connect {
    session_id: usize,
    addr: Recipient<WsMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
struct Disconnect {
    session_id: usize,
}

#[derive(Message, Clone, Debug, Serialize)]
#[rtype(result = "()")]
#[serde(tag = "event", content = "data")]
pub enum PushEvent {
    #[serde(rename = "credits.updated")]
    CreditsUpdated { credits: i64 },
    #[serde(rename = "generation.created")]
    GenerationCreated(Generation),
    #[serde(rename = "generations.updated")]
    GenerationsUpdated { count: usize },
    #[serde(rename = "session.changed")]
    SessionChanged { signed_in: bool },
}

#[derive(Default)]
pub struct WsHub {
    sessions: HashMap<usize, Recipient<WsMessage>>,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for WsHub {
    type Context = actix::Context<Self>;
}

impl Handler<Connect> for WsHub {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Self::Context) -> Self::Result {
        self.sessions.insert(msg.session_id, msg.addr);
        log::debug!("ws tab connected session={} open={}", msg.session_id, self.sessions.len());
    }
}

impl Handler<Disconnect> for WsHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Self::Context) -> Self::Result {
        self.sessions.remove(&msg.session_id);
    }
}

impl Handler<PushEvent> for WsHub {
    type Result = ();

    fn handle(&mut self, msg: PushEvent, _: &mut Self::Context) -> Self::Result {
        match serde_json::to_string(&msg) {
            Ok(payload) => {
                for addr in self.sessions.values() {
                    addr.do_send(WsMessage(payload.clone()));
                }
            }
            Err(e) => log::error!("error encoding push event: {e}"),
        }
    }
}

struct WsSession {
    session_id: usize,
    hub: actix::Addr<WsHub>,
}

impl WsSession {
    fn new(hub: actix::Addr<WsHub>) -> Self {
        Self {
            session_id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            hub,
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hub.do_send(Connect {
            session_id: self.session_id,
            addr: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        self.hub.do_send(Disconnect {
            session_id: self.session_id,
        });
    }
}

impl Handler<WsMessage> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: WsMessage, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.0);
    }
}

impl actix::StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, item: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match item {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(_) => ctx.stop(),
        }
    }
}

/// `GET /ws`; sits behind the session gate.
pub async fn dashboard_ws(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    ws::start(WsSession::new(state.ws_hub.clone()), &req, stream)
}
