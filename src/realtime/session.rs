use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::hub::NotificationHub;
use super::messages::{ClientMessage, Push, ServerMessage};
use crate::auth::AuthService;
use crate::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// One websocket connection. Receives pushes only after an `auth` message
/// carrying a valid session token.
pub struct WebSocketSession {
    id: Uuid,
    peer_addr: String,
    user_id: Option<Uuid>,
    last_heartbeat: Instant,
    hub: Arc<NotificationHub>,
    auth_service: Arc<AuthService>,
}

impl WebSocketSession {
    pub fn new(hub: Arc<NotificationHub>, auth_service: Arc<AuthService>, peer_addr: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_addr,
            user_id: None,
            last_heartbeat: Instant::now(),
            hub,
            auth_service,
        }
    }

    fn handle_client_message(&mut self, text: &str, ctx: &mut <Self as Actor>::Context) {
        match ClientMessage::parse(text) {
            Ok(ClientMessage::Authenticate { token }) => {
                info!("Authentication attempt from {}", self.peer_addr);
                self.authenticate(token, ctx);
            }
            Ok(ClientMessage::Ping) => {
                self.send_server_message(ctx, ServerMessage::Pong);
            }
            Ok(ClientMessage::Pong) => {}
            Err(e) => {
                warn!("Failed to parse message from {}: {}", self.peer_addr, e);
                self.send_server_message(ctx, ServerMessage::Error { message: e.to_string() });
            }
        }
    }

    fn authenticate(&mut self, token: String, ctx: &mut <Self as Actor>::Context) {
        if self.user_id.is_some() {
            self.send_server_message(ctx, ServerMessage::Error { message: "Already authenticated".into() });
            return;
        }

        let auth_service = self.auth_service.clone();
        let hub = self.hub.clone();
        let connection_id = self.id;
        let recipient = ctx.address().recipient::<Push>();

        let fut = async move {
            let user = auth_service.validate_token(&token).await?;
            hub.register(user.id, connection_id, Arc::new(recipient)).await;
            Ok::<Uuid, crate::AppError>(user.id)
        };

        ctx.wait(fut.into_actor(self).map(|result, act, ctx| match result {
            Ok(user_id) => {
                info!("User {} authenticated on connection {}", user_id, act.id);
                act.user_id = Some(user_id);
                act.send_server_message(ctx, ServerMessage::AuthResult { success: true, error: None });
            }
            Err(e) => {
                warn!("Authentication failed for {}: {}", act.peer_addr, e);
                act.send_server_message(ctx, ServerMessage::AuthResult {
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        }));
    }

    fn send_server_message(&self, ctx: &mut <Self as Actor>::Context, msg: ServerMessage) {
        match serde_json::to_string(&msg) {
            Ok(json_str) => ctx.text(json_str),
            Err(e) => error!("Failed to serialize server message: {}", e),
        }
    }

    fn start_heartbeat(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!("Connection {} from {} timed out", act.id, act.peer_addr);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
            act.send_server_message(ctx, ServerMessage::Ping);
        });
    }
}

impl Actor for WebSocketSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("WebSocket connection established with {} (id: {})", self.peer_addr, self.id);
        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("WebSocket connection closed with {} (id: {})", self.peer_addr, self.id);
        if let Some(user_id) = self.user_id {
            let hub = self.hub.clone();
            let connection_id = self.id;
            actix::spawn(async move {
                hub.unregister(user_id, connection_id).await;
            });
        }
    }
}

impl Handler<Push> for WebSocketSession {
    type Result = ();

    fn handle(&mut self, msg: Push, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WebSocketSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                self.handle_client_message(&text, ctx);
            }
            Ok(ws::Message::Binary(bin)) => {
                info!("Received binary message from {} of {} bytes", self.peer_addr, bin.len());
                self.send_server_message(ctx, ServerMessage::Error {
                    message: "Binary messages are not supported".into(),
                });
            }
            Ok(ws::Message::Close(reason)) => {
                info!("WebSocket closed from {}: {:?}", self.peer_addr, reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                error!("Error handling WebSocket message from {}: {}", self.peer_addr, e);
                ctx.stop();
            }
        }
    }
}

/// Upgrades `GET /ws` to a websocket session.
pub async fn websocket_route(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let peer_addr = req
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!("New WebSocket connection request from: {}", peer_addr);

    ws::start(
        WebSocketSession::new(state.hub.clone(), state.auth_service.clone(), peer_addr),
        &req,
        stream,
    )
}
