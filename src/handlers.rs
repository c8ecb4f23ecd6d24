//! Stock handlers registered by the binary

use serde_json::{json, Value};
use telegram_webhook::config::Config;
use telegram_webhook::routing::{HandlerResult, Router};
use telegram_webhook::telegram::{BotError, Context, Message};

const HELP: &str = "/start - say hello\n/help - this message\n/echo <text> - repeat text\nping - pong";

pub fn build_router(config: &Config) -> Router {
    let mut router = Router::new().with_bot_username(config.telegram.bot_username.clone());
    router
        .command("/start", start)
        .command("/help", help)
        .command("/echo", echo)
        .hear("ping", ping)
        .hear_case_insensitive("hello", hello)
        .on("callback_query", callback_query)
        .on("pre_checkout_query", pre_checkout_query);
    router
}

async fn start(ctx: Context, message: Message) -> HandlerResult {
    let name = message
        .from
        .map_or_else(|| "there".to_string(), |user| user.first_name);
    ctx.reply(&format!("Hi {name}! Send /help to see what I can do."), Value::Null)
        .await?;
    Ok(())
}

async fn help(ctx: Context, _message: Message) -> HandlerResult {
    ctx.reply(HELP, Value::Null).await?;
    Ok(())
}

async fn echo(ctx: Context, message: Message) -> HandlerResult {
    let text = message
        .text
        .as_deref()
        .and_then(|t| t.split_once(' '))
        .map(|(_, rest)| rest.trim().to_string())
        .filter(|rest| !rest.is_empty());
    match text {
        Some(text) => ctx.reply(&text, Value::Null).await?,
        None => ctx.reply("Usage: /echo <text>", Value::Null).await?,
    };
    Ok(())
}

async fn ping(ctx: Context, message: Message) -> HandlerResult {
    ctx.reply("pong", json!({ "reply_to_message_id": message.message_id }))
        .await?;
    Ok(())
}

async fn hello(ctx: Context, _message: Message) -> HandlerResult {
    ctx.reply("Hello to you too!", Value::Null).await?;
    Ok(())
}

async fn callback_query(ctx: Context, query: Value) -> HandlerResult {
    let id = query["id"]
        .as_str()
        .ok_or_else(|| BotError::handler("callback_query without id"))?;
    ctx.api().answer_callback_query(id, Value::Null).await?;
    Ok(())
}

async fn pre_checkout_query(ctx: Context, query: Value) -> HandlerResult {
    let id = query["id"]
        .as_str()
        .ok_or_else(|| BotError::handler("pre_checkout_query without id"))?;
    ctx.call(
        "answerPreCheckoutQuery",
        json!({ "pre_checkout_query_id": id, "ok": true }),
    )
    .await?;
    Ok(())
}
