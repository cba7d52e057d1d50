use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use dap::errors::ServerError;
use dap::events::Event;
use dap::requests::Request;
use dap::responses::{Response, ResponseBody, ResponseMessage};
use dap::server::{Server, ServerOutput};

/// DAP framing over one accepted TCP client.
pub struct DapServer {
    server: Server<TcpStream, TcpStream>,
}

impl DapServer {
    pub fn new(stream: TcpStream) -> std::io::Result<DapServer> {
        stream.set_nodelay(true)?;
        let input = BufReader::new(stream.try_clone()?);
        let output = BufWriter::new(stream);

        Ok(DapServer {
            server: Server::new(input, output),
        })
    }

    /// Shared writer half, used by the stop hook and the logger to emit
    /// events from outside the request loop.
    pub fn output(&self) -> Arc<Mutex<ServerOutput<TcpStream>>> {
        self.server.output.clone()
    }

    pub fn poll_request(&mut self) -> Result<Option<Request>, ServerError> {
        let Some(req) = self.server.poll_request()? else {
            return Ok(None);
        };

        log::debug!("{}: {:?}", req.seq, req.command);

        Ok(Some(req))
    }

    pub fn respond_success(&mut self, seq: i64, body: ResponseBody) -> Result<(), ServerError> {
        log::debug!("success {seq}: {body:?}");

        self.server.respond(Response {
            request_seq: seq,
            success: true,
            message: None,
            body: Some(body),
            error: None,
        })
    }

    pub fn respond_error(&mut self, seq: i64, error: impl Into<String>) -> Result<(), ServerError> {
        let error = error.into();

        log::debug!("error {seq}: {error}");

        self.server.respond(Response {
            request_seq: seq,
            success: false,
            message: Some(ResponseMessage::Error(error)),
            body: None,
            error: None,
        })
    }

    pub fn respond_cancel(&mut self, seq: i64) -> Result<(), ServerError> {
        log::debug!("cancel {seq}");

        self.server.respond(Response {
            request_seq: seq,
            success: false,
            message: Some(ResponseMessage::Cancelled),
            body: None,
            error: None,
        })
    }

    pub fn send_event(&mut self, event: Event) -> Result<(), ServerError> {
        self.server.send_event(event)
    }
}
