//! Loader script for the streaming embed.
//!
//! The loader mounts the widget iframe and, when a relay is configured,
//! forwards the widget's lifecycle messages to it so the timer running
//! outside the page sees the same `show`/`hide` stream the page does.

use anyhow::{anyhow, Result};
use url::Url;

use super::message::EMBED_MESSAGE_TYPE;
use crate::config::EmbedConfig;

/// Element id of the wrapper the loader appends to `document.body`.
pub const EMBED_ELEMENT_ID: &str = "heygen-streaming-embed";

/// Element id of the iframe container inside the wrapper.
pub const CONTAINER_ELEMENT_ID: &str = "heygen-streaming-container";

/// A rendered-on-demand loader script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedScript {
    host: Url,
    widget_url: Url,
    relay_url: Option<Url>,
}

impl EmbedScript {
    /// Build the loader for the configured widget.
    ///
    /// # Errors
    ///
    /// Returns an error if the host or relay URL does not parse.
    pub fn from_config(config: &EmbedConfig) -> Result<Self> {
        let host = Url::parse(&config.host)
            .map_err(|e| anyhow!("Invalid embed host {}: {}", config.host, e))?;

        let mut widget_url = host
            .join("/guest/streaming-embed")
            .map_err(|e| anyhow!("Invalid embed host {}: {}", config.host, e))?;
        widget_url
            .query_pairs_mut()
            .append_pair("share", &config.share)
            .append_pair("inIFrame", "1");

        let relay_url = config
            .relay_url
            .as_deref()
            .map(|raw| Url::parse(raw).map_err(|e| anyhow!("Invalid relay url {}: {}", raw, e)))
            .transpose()?;

        Ok(Self {
            host,
            widget_url,
            relay_url,
        })
    }

    /// URL loaded into the widget iframe.
    pub fn widget_url(&self) -> &Url {
        &self.widget_url
    }

    /// Relay endpoint messages are forwarded to, if any.
    pub fn relay_url(&self) -> Option<&Url> {
        self.relay_url.as_ref()
    }

    /// Render the loader as JavaScript source.
    pub fn render(&self) -> String {
        let host = js_string(&self.host.origin().ascii_serialization());
        let src = js_string(self.widget_url.as_str());
        let kind = js_string(EMBED_MESSAGE_TYPE);
        let wrap_id = js_string(EMBED_ELEMENT_ID);
        let container_id = js_string(CONTAINER_ELEMENT_ID);

        let relay = match &self.relay_url {
            Some(url) => format!(
                "fetch({},{{method:\"POST\",mode:\"no-cors\",headers:{{\"Content-Type\":\"text/plain\"}},\
body:JSON.stringify({{origin:e.origin,data:e.data}}),keepalive:true}}).catch(function(){{}});",
                js_string(url.as_str())
            ),
            None => String::new(),
        };

        format!(
            "!function(window){{const host={host};\
const wrap=document.createElement(\"div\");wrap.id={wrap_id};\
const container=document.createElement(\"div\");container.id={container_id};\
const iframe=document.createElement(\"iframe\");\
iframe.allowFullscreen=false;iframe.title=\"Streaming Embed\";iframe.role=\"dialog\";\
iframe.allow=\"microphone\";iframe.src={src};\
window.addEventListener(\"message\",function(e){{\
if(e.origin!==host||!e.data||e.data.type!=={kind})return;\
if(e.data.action===\"init\"){{wrap.classList.add(\"show\");}}\
else if(e.data.action===\"show\"){{wrap.classList.add(\"expand\");}}\
else if(e.data.action===\"hide\"){{wrap.classList.remove(\"expand\");}}\
{relay}}});\
container.appendChild(iframe);wrap.appendChild(container);document.body.appendChild(wrap);\
}}(globalThis);"
        )
    }
}

/// Quote `value` as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(relay_url: Option<&str>) -> EmbedConfig {
        EmbedConfig {
            share: "eyJxdWFsaXR5IjoiaGlnaCJ9".to_string(),
            relay_url: relay_url.map(str::to_string),
            ..EmbedConfig::default()
        }
    }

    #[test]
    fn test_widget_url() {
        let script = EmbedScript::from_config(&config(None)).unwrap();
        assert_eq!(
            script.widget_url().as_str(),
            "https://labs.heygen.com/guest/streaming-embed?share=eyJxdWFsaXR5IjoiaGlnaCJ9&inIFrame=1"
        );
    }

    #[test]
    fn test_render_without_relay_has_no_fetch() {
        let source = EmbedScript::from_config(&config(None)).unwrap().render();
        assert!(source.contains("\"heygen-streaming-embed\""));
        assert!(source.contains("iframe.allow=\"microphone\""));
        assert!(source.contains("const host=\"https://labs.heygen.com\";"));
        assert!(!source.contains("fetch("));
    }

    #[test]
    fn test_render_with_relay_forwards_messages() {
        let script =
            EmbedScript::from_config(&config(Some("http://127.0.0.1:8787/messages"))).unwrap();
        let source = script.render();
        assert!(source.contains("fetch(\"http://127.0.0.1:8787/messages\""));
        assert!(source.contains("origin:e.origin"));
    }

    #[test]
    fn test_invalid_relay_url() {
        assert!(EmbedScript::from_config(&config(Some("::nope"))).is_err());
    }

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string("a\"b</"), "\"a\\\"b</\"");
    }
}
