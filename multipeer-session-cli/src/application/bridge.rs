use crate::application::protocol::{Command, Request, Response};
use crate::infrastructure::Result;
use multipeer_session_p2p::{
    EventCategory, SendMode, SessionCoordinator, SessionError, Transport,
};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Serve JSON-lines requests from `input` until it closes or `shutdown` resolves
///
/// Responses and registered events are written to `output` one per line.
/// The coordinator is shut down before returning.
pub async fn serve<T, R, W>(
    coordinator: Arc<SessionCoordinator<T>>,
    mut input: R,
    output: &mut W,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    T: Transport,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut responses) = mpsc::unbounded_channel();
    let mut dispatcher = CommandDispatcher::new(coordinator.clone(), tx);
    let mut line = Vec::new();
    tokio::pin!(shutdown);

    tracing::info!("Bridge ready, reading requests");

    loop {
        tokio::select! {
            read = input.read_until(b'\n', &mut line) => {
                if read? == 0 {
                    tracing::info!("Input closed");
                    break;
                }
                dispatcher.handle_bytes(&line);
                line.clear();
            }
            Some(response) = responses.recv() => {
                write_response(output, &response).await?;
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down...");
                break;
            }
        }
    }

    while let Ok(response) = responses.try_recv() {
        write_response(output, &response).await?;
    }

    drop(dispatcher);
    coordinator.shutdown();
    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(output: &mut W, response: &Response) -> Result<()> {
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await?;
    Ok(())
}

/// Turns bridge requests into coordinator calls and coordinator events into responses
///
/// Every ordinary call yields exactly one response. `register` yields none
/// immediately; its events arrive later under the registering call id.
/// Must be used inside a tokio runtime.
pub struct CommandDispatcher<T: Transport> {
    coordinator: Arc<SessionCoordinator<T>>,
    responses: mpsc::UnboundedSender<Response>,
    forwarders: HashMap<EventCategory, JoinHandle<()>>,
}

impl<T: Transport> CommandDispatcher<T> {
    pub fn new(
        coordinator: Arc<SessionCoordinator<T>>,
        responses: mpsc::UnboundedSender<Response>,
    ) -> Self {
        Self {
            coordinator,
            responses,
            forwarders: HashMap::new(),
        }
    }

    pub fn coordinator(&self) -> &Arc<SessionCoordinator<T>> {
        &self.coordinator
    }

    /// Dispatch one raw input line, skipping blank ones
    pub fn handle_bytes(&mut self, line: &[u8]) {
        match std::str::from_utf8(line) {
            Ok(text) if text.trim().is_empty() => {}
            Ok(text) => self.handle_line(text),
            Err(e) => {
                tracing::warn!("Request is not valid UTF-8: {}", e);
                self.respond(Response::error(
                    "",
                    "Validation",
                    format!("request is not valid UTF-8: {e}"),
                ));
            }
        }
    }

    /// Parse and dispatch one input line
    pub fn handle_line(&mut self, line: &str) {
        match Request::parse(line) {
            Ok(request) => self.handle(request),
            Err((call_id, message)) => {
                tracing::warn!("Malformed request: {}", message);
                self.respond(Response::error(
                    call_id.unwrap_or_default(),
                    "Validation",
                    message,
                ));
            }
        }
    }

    pub fn handle(&mut self, request: Request) {
        let Request { call_id, command } = request;
        tracing::debug!(%call_id, ?command, "Dispatching");

        let coordinator = &self.coordinator;
        let outcome: std::result::Result<Option<serde_json::Value>, SessionError> = match command {
            Command::GetLocalPeerInfo => Ok(to_payload(&coordinator.local_peer_info())),
            Command::StartAdvertising { service_type } => coordinator
                .start_advertising(&service_type)
                .map(|()| None),
            Command::StopAdvertising => {
                coordinator.stop_advertising();
                Ok(None)
            }
            Command::StartBrowsing { service_type } => {
                coordinator.start_browsing(&service_type).map(|()| None)
            }
            Command::StopBrowsing => {
                coordinator.stop_browsing();
                Ok(None)
            }
            Command::InvitePeer { peer_id } => coordinator.invite_peer(peer_id).map(|()| None),
            Command::AcceptInvitation { invitation_id } => coordinator
                .accept_invitation(invitation_id)
                .map(|()| None),
            Command::DeclineInvitation { invitation_id } => coordinator
                .decline_invitation(invitation_id)
                .map(|()| None),
            Command::Disconnect => {
                coordinator.disconnect();
                Ok(None)
            }
            Command::GetConnectedPeers => Ok(to_payload(&coordinator.connected_peers())),
            Command::SendDataReliable { peers, data } => coordinator
                .send_data(&peers.into_vec(), &data.into_bytes(), SendMode::Reliable)
                .map(|sent| to_payload(&sent)),
            Command::SendDataUnreliable { peers, data } => coordinator
                .send_data(&peers.into_vec(), &data.into_bytes(), SendMode::Unreliable)
                .map(|sent| to_payload(&sent)),
            Command::Register { event } => {
                self.register(call_id, event);
                return;
            }
        };

        let response = match outcome {
            Ok(payload) => Response::ok(call_id, payload),
            Err(e) => {
                tracing::warn!(%call_id, "Call failed: {}", e);
                Response::from_session_error(call_id, &e)
            }
        };
        self.respond(response);
    }

    /// Arm `category` with a forwarding task, replacing the previous stream
    fn register(&mut self, call_id: String, category: EventCategory) {
        let mut events = self.coordinator.subscribe(category);
        let responses = self.responses.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if responses.send(Response::event(&call_id, &event)).is_err() {
                    break;
                }
            }
            tracing::debug!(%call_id, "Event stream closed");
        });

        if let Some(previous) = self.forwarders.insert(category, task) {
            previous.abort();
        }
        tracing::info!(%category, "Event stream registered");
    }

    fn respond(&self, response: Response) {
        if self.responses.send(response).is_err() {
            tracing::debug!("Response channel closed");
        }
    }
}

impl<T: Transport> Drop for CommandDispatcher<T> {
    fn drop(&mut self) {
        for (_, task) in self.forwarders.drain() {
            task.abort();
        }
    }
}

fn to_payload(value: &impl Serialize) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::protocol::Status;
    use multipeer_session_p2p::{CoordinatorConfig, LoopbackNetwork, LoopbackTransport};
    use serde_json::json;

    type Harness = (
        CommandDispatcher<LoopbackTransport>,
        mpsc::UnboundedReceiver<Response>,
    );

    fn dispatcher(network: &LoopbackNetwork, name: &str) -> Harness {
        let coordinator = SessionCoordinator::new(network.join(), CoordinatorConfig::new(name));
        let (tx, rx) = mpsc::unbounded_channel();
        (CommandDispatcher::new(coordinator, tx), rx)
    }

    #[tokio::test]
    async fn test_local_peer_info() {
        let network = LoopbackNetwork::new();
        let (mut bridge, mut responses) = dispatcher(&network, "Phone");

        bridge.handle_line(r#"{"callId":"1","action":"getLocalPeerInfo"}"#);

        let response = responses.recv().await.unwrap();
        assert_eq!(response.call_id, "1");
        assert_eq!(response.status, Status::Ok);
        let payload = response.payload.unwrap();
        assert_eq!(payload["id"], json!(0));
        assert_eq!(payload["name"], json!("Phone"));
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let network = LoopbackNetwork::new();
        let (mut bridge, mut responses) = dispatcher(&network, "Phone");

        bridge.handle_line(r#"{"callId":"2","action":"startAdvertising","args":{"serviceType":""}}"#);

        let response = responses.recv().await.unwrap();
        assert_eq!(response.status, Status::Error);
        assert_eq!(response.payload.unwrap()["kind"], json!("Validation"));
    }

    #[tokio::test]
    async fn test_malformed_line_is_validation_error() {
        let network = LoopbackNetwork::new();
        let (mut bridge, mut responses) = dispatcher(&network, "Phone");

        bridge.handle_line(r#"{"callId":"3","action":"invitePeer"}"#);

        let response = responses.recv().await.unwrap();
        assert_eq!(response.call_id, "3");
        assert_eq!(response.status, Status::Error);
        assert_eq!(response.payload.unwrap()["kind"], json!("Validation"));
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_is_invalid_reference() {
        let network = LoopbackNetwork::new();
        let (mut bridge, mut responses) = dispatcher(&network, "Phone");

        bridge.handle_line(
            r#"{"callId":"4","action":"sendDataReliable","args":{"peers":[5],"data":"hi"}}"#,
        );

        let response = responses.recv().await.unwrap();
        assert_eq!(response.payload.unwrap()["kind"], json!("InvalidReference"));
    }

    #[tokio::test]
    async fn test_serve_answers_invalid_utf8_and_keeps_going() {
        let network = LoopbackNetwork::new();
        let coordinator = SessionCoordinator::new(network.join(), CoordinatorConfig::new("Phone"));
        let mut input = br#"{"callId":"0","action":"getLocalPeerInfo"}"#.to_vec();
        input.extend_from_slice(b"\n\xff\xfe\n\n");
        input.extend_from_slice(br#"{"callId":"1","action":"getLocalPeerInfo"}"#);
        input.push(b'\n');
        let mut output = Vec::new();

        serve(coordinator, input.as_slice(), &mut output, std::future::pending())
            .await
            .unwrap();

        let lines: Vec<serde_json::Value> = output
            .split(|byte| *byte == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["callId"], json!("0"));
        assert_eq!(lines[0]["status"], json!("ok"));
        assert_eq!(lines[1]["callId"], json!(""));
        assert_eq!(lines[1]["status"], json!("error"));
        assert_eq!(lines[1]["payload"]["kind"], json!("Validation"));
        assert_eq!(lines[2]["callId"], json!("1"));
        assert_eq!(lines[2]["payload"]["name"], json!("Phone"));
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let network = LoopbackNetwork::new();
        let coordinator = SessionCoordinator::new(network.join(), CoordinatorConfig::new("Phone"));
        coordinator.start_advertising("chat").unwrap();
        let (_keep_open, reader) = tokio::io::duplex(64);
        let mut output = Vec::new();

        serve(
            coordinator.clone(),
            tokio::io::BufReader::new(reader),
            &mut output,
            async {},
        )
        .await
        .unwrap();

        assert!(output.is_empty());
        assert!(!coordinator.is_advertising());
    }

    #[tokio::test]
    async fn test_registered_stream_keeps_callback() {
        let network = LoopbackNetwork::new();
        let (mut bridge, mut responses) = dispatcher(&network, "Phone");
        let other = SessionCoordinator::new(network.join(), CoordinatorConfig::new("Tablet"));

        bridge.handle_line(r#"{"callId":"5","action":"register","args":{"event":"FoundPeer"}}"#);
        bridge.handle_line(r#"{"callId":"6","action":"startBrowsing","args":{"serviceType":"chat"}}"#);
        other.start_advertising("chat").unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(responses.recv().await.unwrap());
        }
        seen.sort_by(|a, b| a.call_id.cmp(&b.call_id));

        assert_eq!(seen[0].call_id, "5");
        assert!(seen[0].keep_callback);
        assert_eq!(seen[0].payload.as_ref().unwrap()["name"], json!("Tablet"));
        assert_eq!(seen[1].call_id, "6");
        assert!(!seen[1].keep_callback);
    }

    #[tokio::test]
    async fn test_reregistering_replaces_stream() {
        let network = LoopbackNetwork::new();
        let (mut bridge, mut responses) = dispatcher(&network, "Phone");
        let other = SessionCoordinator::new(network.join(), CoordinatorConfig::new("Tablet"));

        bridge.handle_line(r#"{"callId":"a","action":"register","args":{"event":"FoundPeer"}}"#);
        bridge.handle_line(r#"{"callId":"b","action":"register","args":{"event":"FoundPeer"}}"#);
        bridge.coordinator().start_browsing("chat").unwrap();
        other.start_advertising("chat").unwrap();

        let response = responses.recv().await.unwrap();
        assert_eq!(response.call_id, "b");
        assert!(responses.try_recv().is_err());
    }
}
