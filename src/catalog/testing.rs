//! Scripted in-memory transport for tests.
//!
//! Routes match on the `request` (or `service`) parameter plus any number
//! of exact parameter values. Held routes park the request until the test
//! releases it, which lets tests interleave responses with new selections.

use super::transport::{Transport, TransportError};
use futures_channel::oneshot;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use std::cell::RefCell;
use std::rc::Rc;

enum Reply {
    Body(String),
    Fail(TransportError),
    Hold,
}

struct Route {
    kind: String,
    params: Vec<(String, String)>,
    reply: Reply,
}

struct Held {
    url: String,
    sender: oneshot::Sender<Result<String, TransportError>>,
}

#[derive(Default)]
struct ScriptState {
    routes: Vec<Route>,
    requests: Vec<String>,
    held: Vec<Held>,
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    state: RefCell<ScriptState>,
}

impl ScriptedTransport {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Answers matching requests with a JSON body. Later routes win.
    pub fn respond(&self, kind: &str, params: &[(&str, &str)], body: serde_json::Value) {
        self.add_route(kind, params, Reply::Body(body.to_string()));
    }

    pub fn fail(&self, kind: &str, params: &[(&str, &str)], error: TransportError) {
        self.add_route(kind, params, Reply::Fail(error));
    }

    /// Parks matching requests until [`ScriptedTransport::release`].
    pub fn hold(&self, kind: &str, params: &[(&str, &str)]) {
        self.add_route(kind, params, Reply::Hold);
    }

    /// Completes the oldest parked request whose URL contains `needle`.
    ///
    /// Returns false if nothing matched or the receiving side was dropped.
    pub fn release(&self, needle: &str, body: serde_json::Value) -> bool {
        let held = {
            let mut state = self.state.borrow_mut();
            match state.held.iter().position(|h| h.url.contains(needle)) {
                Some(idx) => state.held.remove(idx),
                None => return false,
            }
        };
        held.sender.send(Ok(body.to_string())).is_ok()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.borrow().requests.clone()
    }

    /// Decoded parameters of every request of the given kind.
    pub fn requests_of(&self, kind: &str) -> Vec<Vec<(String, String)>> {
        self.requests()
            .iter()
            .map(|url| parse_query(url))
            .filter(|params| request_kind(params) == Some(kind))
            .collect()
    }

    fn add_route(&self, kind: &str, params: &[(&str, &str)], reply: Reply) {
        self.state.borrow_mut().routes.push(Route {
            kind: kind.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            reply,
        });
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str) -> LocalBoxFuture<'static, Result<String, TransportError>> {
        let params = parse_query(url);
        let mut state = self.state.borrow_mut();
        state.requests.push(url.to_string());

        let reply = state
            .routes
            .iter()
            .rev()
            .find(|route| {
                request_kind(&params) == Some(route.kind.as_str())
                    && route
                        .params
                        .iter()
                        .all(|(k, v)| params.iter().any(|(pk, pv)| pk == k && pv == v))
            })
            .map(|route| match &route.reply {
                Reply::Body(body) => Reply::Body(body.clone()),
                Reply::Fail(error) => Reply::Fail(error.clone()),
                Reply::Hold => Reply::Hold,
            });

        match reply {
            Some(Reply::Body(body)) => futures_util::future::ready(Ok(body)).boxed_local(),
            Some(Reply::Fail(error)) => futures_util::future::ready(Err(error)).boxed_local(),
            Some(Reply::Hold) => {
                let (sender, receiver) = oneshot::channel();
                state.held.push(Held {
                    url: url.to_string(),
                    sender,
                });
                receiver
                    .map(|r| r.unwrap_or(Err(TransportError::Cancelled)))
                    .boxed_local()
            }
            None => futures_util::future::ready(Err(TransportError::Network(format!(
                "no scripted response for {url}"
            ))))
            .boxed_local(),
        }
    }
}

/// Value of a parameter in decoded query pairs.
pub(crate) fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn request_kind(params: &[(String, String)]) -> Option<&str> {
    param(params, "request").or_else(|| param(params, "service"))
}

fn parse_query(url: &str) -> Vec<(String, String)> {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(k), decode(v))
        })
        .collect()
}

fn decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
            out.push(u8::from_str_radix(hex, 16).unwrap());
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).unwrap()
}
