//! Update router
//!
//! Holds the registered command, text and event handlers and dispatches one
//! update against them.

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;

use super::matcher::{first_match, match_command, match_text, TextMatch};
use crate::telegram::command::{normalize_registered, parse_command, strip_mention};
use crate::telegram::{BotError, Context, Message};

pub type HandlerResult = Result<(), BotError>;

type Handler<T> = Box<dyn Fn(Context, T) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

fn boxed<T, F, Fut>(handler: F) -> Handler<T>
where
    T: 'static,
    F: Fn(Context, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Box::new(move |ctx, payload| Box::pin(handler(ctx, payload)))
}

struct CommandRoute {
    command: String,
    handler: Handler<Message>,
}

struct TextRoute {
    pattern: String,
    mode: TextMatch,
    handler: Handler<Message>,
}

struct EventRoute {
    kind: String,
    handler: Handler<Value>,
}

/// Which handler an update was routed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matched {
    Command(String),
    Text(String),
    Unhandled,
}

/// Outcome of dispatching one update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub matched: Matched,
    /// Number of event handlers that ran
    pub events: usize,
}

#[derive(Default)]
pub struct Router {
    commands: Vec<CommandRoute>,
    texts: Vec<TextRoute>,
    events: Vec<EventRoute>,
    bot_username: Option<String>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field(
                "commands",
                &self.commands.iter().map(|r| &r.command).collect::<Vec<_>>(),
            )
            .field(
                "texts",
                &self.texts.iter().map(|r| &r.pattern).collect::<Vec<_>>(),
            )
            .field(
                "events",
                &self.events.iter().map(|r| &r.kind).collect::<Vec<_>>(),
            )
            .field("bot_username", &self.bot_username)
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `/cmd@username` addressed to this bot and ignore commands
    /// addressed to other bots.
    #[must_use]
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// Register a command handler (`/start`, `help`, ...).
    ///
    /// Registering the same name again replaces the earlier handler in place.
    pub fn command<F, Fut>(&mut self, command: &str, handler: F) -> &mut Self
    where
        F: Fn(Context, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let command = normalize_registered(command);
        let handler = boxed(handler);
        match self.commands.iter_mut().find(|r| r.command == command) {
            Some(route) => route.handler = handler,
            None => self.commands.push(CommandRoute { command, handler }),
        }
        self
    }

    /// Register a handler for messages whose text equals `text` exactly.
    pub fn hear<F, Fut>(&mut self, text: &str, handler: F) -> &mut Self
    where
        F: Fn(Context, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.push_text(text, TextMatch::Exact, boxed(handler))
    }

    /// Like [`Router::hear`], ignoring ASCII case.
    pub fn hear_case_insensitive<F, Fut>(&mut self, text: &str, handler: F) -> &mut Self
    where
        F: Fn(Context, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.push_text(text, TextMatch::IgnoreCase, boxed(handler))
    }

    /// Register a handler for any update carrying the field `kind`
    /// (`callback_query`, `pre_checkout_query`, ...). It receives that field's value.
    pub fn on<F, Fut>(&mut self, kind: &str, handler: F) -> &mut Self
    where
        F: Fn(Context, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.events.push(EventRoute {
            kind: kind.to_string(),
            handler: boxed(handler),
        });
        self
    }

    fn push_text(&mut self, text: &str, mode: TextMatch, handler: Handler<Message>) -> &mut Self {
        self.texts.push(TextRoute {
            pattern: text.to_string(),
            mode,
            handler,
        });
        self
    }

    /// Dispatch one update.
    ///
    /// All matching event handlers run first, in registration order. Then the
    /// first command matching a `bot_command` entity runs; failing that, the
    /// first matching text handler. At most one command or text handler runs.
    pub async fn dispatch(&self, ctx: &Context) -> Result<Dispatch, BotError> {
        let mut events = 0;
        for route in &self.events {
            if let Some(payload) = ctx.update().field(&route.kind) {
                (route.handler)(ctx.clone(), payload.clone()).await?;
                events += 1;
            }
        }

        let Some(message) = ctx.update().message() else {
            return Ok(Dispatch {
                matched: Matched::Unhandled,
                events,
            });
        };

        if let Some(route) = self.find_command(message) {
            (route.handler)(ctx.clone(), message.clone()).await?;
            return Ok(Dispatch {
                matched: Matched::Command(route.command.clone()),
                events,
            });
        }

        if let Some(route) = self.find_text(message) {
            (route.handler)(ctx.clone(), message.clone()).await?;
            return Ok(Dispatch {
                matched: Matched::Text(route.pattern.clone()),
                events,
            });
        }

        Ok(Dispatch {
            matched: Matched::Unhandled,
            events,
        })
    }

    fn find_command(&self, message: &Message) -> Option<&CommandRoute> {
        message.bot_commands().find_map(|entity_text| {
            let token = parse_command(entity_text);
            let command = strip_mention(&token, self.bot_username.as_deref())?;
            first_match(&self.commands, |route| match_command(&route.command, command))
        })
    }

    fn find_text(&self, message: &Message) -> Option<&TextRoute> {
        let text = message.text.as_deref().filter(|t| !t.is_empty())?;
        first_match(&self.texts, |route| match_text(&route.pattern, route.mode, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::{ApiClient, Update};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Calls = Arc<Mutex<Vec<String>>>;

    fn context(update: Value) -> Context {
        let api = ApiClient::new("t", "http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        Context::new(Arc::new(api), Update::from_value(update))
    }

    fn text_update(text: &str) -> Value {
        json!({
            "update_id": 1,
            "message": {"message_id": 1, "chat": {"id": 3}, "text": text}
        })
    }

    fn command_update(text: &str, length: usize) -> Value {
        json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "chat": {"id": 3},
                "text": text,
                "entities": [{"type": "bot_command", "offset": 0, "length": length}]
            }
        })
    }

    fn recorder(calls: &Calls, name: &'static str) -> impl Fn(Context, Message) -> BoxFuture<'static, HandlerResult> {
        let calls = Arc::clone(calls);
        move |_ctx, _message| {
            calls.lock().unwrap().push(name.to_string());
            Box::pin(async { Ok::<(), BotError>(()) })
        }
    }

    fn event_recorder(calls: &Calls, name: &'static str) -> impl Fn(Context, Value) -> BoxFuture<'static, HandlerResult> {
        let calls = Arc::clone(calls);
        move |_ctx, payload| {
            calls.lock().unwrap().push(format!("{name}:{payload}"));
            Box::pin(async { Ok::<(), BotError>(()) })
        }
    }

    #[tokio::test]
    async fn test_command_matches_case_insensitively() {
        let calls = Calls::default();
        let mut router = Router::new();
        router
            .command("/start", recorder(&calls, "start"))
            .command("/help", recorder(&calls, "help"));

        let result = router.dispatch(&context(command_update("/HELP me", 5))).await.unwrap();
        assert_eq!(result.matched, Matched::Command("/help".to_string()));
        assert_eq!(*calls.lock().unwrap(), vec!["help"]);
    }

    #[tokio::test]
    async fn test_command_registered_without_slash() {
        let calls = Calls::default();
        let mut router = Router::new();
        router.command("start", recorder(&calls, "start"));

        let result = router.dispatch(&context(command_update("/start", 6))).await.unwrap();
        assert_eq!(result.matched, Matched::Command("/start".to_string()));
    }

    #[tokio::test]
    async fn test_reregistering_command_replaces_handler() {
        let calls = Calls::default();
        let mut router = Router::new();
        router
            .command("/start", recorder(&calls, "first"))
            .command("/start", recorder(&calls, "second"));

        router.dispatch(&context(command_update("/start", 6))).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["second"]);
    }

    #[tokio::test]
    async fn test_first_matching_entity_wins() {
        let calls = Calls::default();
        let mut router = Router::new();
        router
            .command("/b", recorder(&calls, "b"))
            .command("/a", recorder(&calls, "a"));

        let update = json!({
            "message": {
                "chat": {"id": 3},
                "text": "/x /a /b",
                "entities": [
                    {"type": "bot_command", "offset": 0, "length": 2},
                    {"type": "bot_command", "offset": 3, "length": 2},
                    {"type": "bot_command", "offset": 6, "length": 2}
                ]
            }
        });
        let result = router.dispatch(&context(update)).await.unwrap();
        assert_eq!(result.matched, Matched::Command("/a".to_string()));
        assert_eq!(*calls.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_command_takes_priority_over_text() {
        let calls = Calls::default();
        let mut router = Router::new();
        router
            .hear("/start", recorder(&calls, "hear"))
            .command("/start", recorder(&calls, "command"));

        router.dispatch(&context(command_update("/start", 6))).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["command"]);
    }

    #[tokio::test]
    async fn test_unknown_command_falls_through_to_text() {
        let calls = Calls::default();
        let mut router = Router::new();
        router
            .command("/start", recorder(&calls, "start"))
            .hear("/unknown", recorder(&calls, "hear"));

        let result = router.dispatch(&context(command_update("/unknown", 8))).await.unwrap();
        assert_eq!(result.matched, Matched::Text("/unknown".to_string()));
        assert_eq!(*calls.lock().unwrap(), vec!["hear"]);
    }

    #[tokio::test]
    async fn test_hear_is_case_sensitive() {
        let calls = Calls::default();
        let mut router = Router::new();
        router.hear("Hello", recorder(&calls, "hello"));

        let result = router.dispatch(&context(text_update("hello"))).await.unwrap();
        assert_eq!(result.matched, Matched::Unhandled);

        let result = router.dispatch(&context(text_update("Hello"))).await.unwrap();
        assert_eq!(result.matched, Matched::Text("Hello".to_string()));
        assert_eq!(*calls.lock().unwrap(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_hear_case_insensitive_first_registration_wins() {
        let calls = Calls::default();
        let mut router = Router::new();
        router
            .hear("ping", recorder(&calls, "exact"))
            .hear_case_insensitive("PING", recorder(&calls, "loose"))
            .hear_case_insensitive("ping", recorder(&calls, "later"));

        router.dispatch(&context(text_update("Ping"))).await.unwrap();
        router.dispatch(&context(text_update("ping"))).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["loose", "exact"]);
    }

    #[tokio::test]
    async fn test_empty_text_is_not_matched() {
        let calls = Calls::default();
        let mut router = Router::new();
        router.hear("", recorder(&calls, "empty"));

        let result = router.dispatch(&context(text_update(""))).await.unwrap();
        assert_eq!(result.matched, Matched::Unhandled);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_handlers_all_run_before_commands() {
        let calls = Calls::default();
        let mut router = Router::new();
        router
            .command("/start", recorder(&calls, "command"))
            .on("message", event_recorder(&calls, "first"))
            .on("callback_query", event_recorder(&calls, "callback"))
            .on("message", event_recorder(&calls, "second"));

        let result = router.dispatch(&context(command_update("/start", 6))).await.unwrap();
        assert_eq!(result.events, 2);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].starts_with("first:"));
        assert!(calls[1].starts_with("second:"));
        assert_eq!(calls[2], "command");
    }

    #[tokio::test]
    async fn test_event_handler_receives_field_value() {
        let calls = Calls::default();
        let mut router = Router::new();
        router.on("poll", event_recorder(&calls, "poll"));

        let result = router
            .dispatch(&context(json!({"update_id": 5, "poll": {"id": "p1"}})))
            .await
            .unwrap();
        assert_eq!(result, Dispatch { matched: Matched::Unhandled, events: 1 });
        assert_eq!(*calls.lock().unwrap(), vec![r#"poll:{"id":"p1"}"#]);
    }

    #[tokio::test]
    async fn test_bot_username_filters_addressed_commands() {
        let calls = Calls::default();
        let mut router = Router::new().with_bot_username(Some("hook_bot".to_string()));
        router.command("/start", recorder(&calls, "start"));

        let result = router
            .dispatch(&context(command_update("/start@other_bot", 16)))
            .await
            .unwrap();
        assert_eq!(result.matched, Matched::Unhandled);

        let result = router
            .dispatch(&context(command_update("/start@Hook_Bot", 15)))
            .await
            .unwrap();
        assert_eq!(result.matched, Matched::Command("/start".to_string()));
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let mut router = Router::new();
        router.command("/fail", |_ctx, _message| async {
            Err::<(), _>(BotError::handler("boom"))
        });

        let err = router
            .dispatch(&context(command_update("/fail", 5)))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Handler(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_failing_event_handler_stops_dispatch() {
        let calls = Calls::default();
        let mut router = Router::new();
        router
            .on("message", |_ctx, _payload| async {
                Err::<(), _>(BotError::handler("rejected"))
            })
            .on("message", event_recorder(&calls, "later_event"))
            .command("/start", recorder(&calls, "start"))
            .hear("/start", recorder(&calls, "text"));

        let err = router
            .dispatch(&context(command_update("/start", 6)))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Handler(ref m) if m == "rejected"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_update_is_unhandled() {
        let router = Router::new();
        let result = router.dispatch(&context(json!({}))).await.unwrap();
        assert_eq!(result, Dispatch { matched: Matched::Unhandled, events: 0 });
    }
}
