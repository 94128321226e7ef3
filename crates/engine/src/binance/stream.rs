use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use url::Url;

use common::{Error, Result, Tick, TradeSide};

/// Binance raw trade WebSocket stream for a single symbol.
///
/// Parses every `trade` event into a `Tick` and forwards it on an mpsc
/// channel. The stream does not reconnect: when the connection drops or the
/// receiver goes away, `run` returns.
pub struct TradeStream {
    symbol: String,
    tick_tx: mpsc::Sender<Tick>,
}

impl TradeStream {
    pub fn new(symbol: impl Into<String>, tick_tx: mpsc::Sender<Tick>) -> Self {
        Self {
            symbol: symbol.into(),
            tick_tx,
        }
    }

    pub fn url(&self) -> String {
        format!(
            "wss://stream.binance.com:9443/ws/{}@trade",
            self.symbol.to_lowercase()
        )
    }

    /// Connect and forward trades until the socket closes.
    pub async fn run(self) -> Result<()> {
        let url = Url::parse(&self.url()).map_err(|e| Error::WebSocket(e.to_string()))?;
        info!(symbol = %self.symbol, %url, "Connecting to Binance trade stream");

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        info!(symbol = %self.symbol, "Trade stream connected");

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

            match msg {
                Message::Text(text) => match parse_trade_event(&text) {
                    Ok(Some(tick)) => {
                        if self.tick_tx.send(tick).await.is_err() {
                            info!("Tick receiver dropped, closing trade stream");
                            return Ok(());
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Failed to parse trade event"),
                },
                Message::Close(frame) => {
                    info!(symbol = %self.symbol, ?frame, "Trade stream closed by server");
                    break;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[derive(Deserialize)]
struct TradeEvent {
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "q")]
    quantity: String,
    /// Buyer is the maker, so the aggressor sold into the bid.
    #[serde(rename = "m")]
    buyer_is_maker: bool,
    #[serde(rename = "T")]
    trade_time_ms: i64,
}

/// Parse one stream message. Non-trade messages yield `Ok(None)`.
///
/// Side follows the aggressor: a taker buy lifts the ask, so `is_ask` is
/// the negation of the buyer-is-maker flag.
pub fn parse_trade_event(text: &str) -> Result<Option<Tick>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if value.get("e").and_then(|v| v.as_str()) != Some("trade") {
        return Ok(None);
    }

    let event: TradeEvent = serde_json::from_value(value)?;

    let price: f64 = event
        .price
        .parse()
        .map_err(|_| Error::Parse(format!("invalid price {:?}", event.price)))?;
    let volume: f64 = event
        .quantity
        .parse()
        .map_err(|_| Error::Parse(format!("invalid quantity {:?}", event.quantity)))?;
    let timestamp: DateTime<Utc> = Utc
        .timestamp_millis_opt(event.trade_time_ms)
        .single()
        .ok_or_else(|| Error::Parse(format!("invalid trade time {}", event.trade_time_ms)))?;

    Tick::checked(
        price,
        volume,
        TradeSide::from_is_ask(!event.buyer_is_maker),
        timestamp,
    )
    .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRADE: &str = r#"{"e":"trade","E":1700000000123,"s":"BTCUSDT","t":12345,"p":"43250.12000000","q":"0.00150000","b":88,"a":50,"T":1700000000120,"m":true,"M":true}"#;

    #[test]
    fn parses_trade_event() {
        let tick = parse_trade_event(TRADE).unwrap().unwrap();
        assert_eq!(tick.price, 43250.12);
        assert_eq!(tick.volume, 0.0015);
        assert_eq!(tick.side, TradeSide::Bid);
        assert_eq!(tick.timestamp.timestamp_millis(), 1_700_000_000_120);
    }

    #[test]
    fn taker_buy_is_ask_side() {
        let text = TRADE.replace(r#""m":true"#, r#""m":false"#);
        let tick = parse_trade_event(&text).unwrap().unwrap();
        assert_eq!(tick.side, TradeSide::Ask);
    }

    #[test]
    fn non_trade_messages_are_skipped() {
        assert!(parse_trade_event(r#"{"result":null,"id":1}"#).unwrap().is_none());
        assert!(parse_trade_event(r#"{"e":"kline","k":{}}"#).unwrap().is_none());
    }

    #[test]
    fn malformed_messages_are_errors() {
        assert!(matches!(parse_trade_event("not json"), Err(Error::Json(_))));
        let bad_price = TRADE.replace("43250.12000000", "abc");
        assert!(matches!(parse_trade_event(&bad_price), Err(Error::Parse(_))));
        let missing = r#"{"e":"trade","p":"1.0"}"#;
        assert!(parse_trade_event(missing).is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for (price, qty) in [("0", "1.0"), ("NaN", "1.0"), ("-1.5", "1.0"), ("inf", "1.0"), ("100.0", "-50")] {
            let text = TRADE
                .replace("43250.12000000", price)
                .replace("0.00150000", qty);
            assert!(
                matches!(parse_trade_event(&text), Err(Error::Parse(_))),
                "accepted p={price} q={qty}"
            );
        }
    }

    #[test]
    fn url_uses_lowercase_symbol() {
        let (tx, _rx) = mpsc::channel(1);
        let stream = TradeStream::new("ETHUSDT", tx);
        assert_eq!(stream.url(), "wss://stream.binance.com:9443/ws/ethusdt@trade");
    }
}
