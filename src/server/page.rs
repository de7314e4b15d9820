/// What the chat page shows and where its socket connects.
#[derive(Debug, Clone)]
pub struct PageConfig {
    pub title: String,
    pub icon: String,
    pub placeholder: String,
    /// Fixed WebSocket URL; when unset the page builds one from its own host.
    pub ws_url: Option<String>,
    pub ws_port: u16,
}

const ICON_SHORTCODES: &[(&str, &str)] = &[
    (":books:", "📚"),
    (":book:", "📖"),
    (":robot_face:", "🤖"),
    (":speech_balloon:", "💬"),
    (":sparkles:", "✨"),
];

pub fn resolve_icon(icon: &str) -> &str {
    ICON_SHORTCODES
        .iter()
        .find(|(code, _)| *code == icon.trim())
        .map(|(_, emoji)| *emoji)
        .unwrap_or(icon)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// JSON string literal that is safe inside a <script> block.
fn script_string(value: &str) -> String {
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

pub fn render_page(config: &PageConfig) -> String {
    let title = escape_html(&config.title);
    let icon = escape_html(resolve_icon(&config.icon));
    let placeholder = escape_html(&config.placeholder);
    let ws_url = config.ws_url
        .as_deref()
        .map(script_string)
        .unwrap_or_else(|| "null".to_string());

    let ws_port = config.ws_port.to_string();

    fill_slots(PAGE_TEMPLATE, |slot| {
        match slot {
            "title" => Some(title.as_str()),
            "icon" => Some(icon.as_str()),
            "placeholder" => Some(placeholder.as_str()),
            "ws_url" => Some(ws_url.as_str()),
            "ws_port" => Some(ws_port.as_str()),
            _ => None,
        }
    })
}

/// Replaces `{{name}}` slots in one left-to-right pass. Substituted values are
/// never scanned again; unknown slots are kept as written.
fn fill_slots<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let name = &after_open[..end];
                match lookup(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after_open[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

const PAGE_TEMPLATE: &str =
    r#"<!DOCTYPE html>
<html lang="ko">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{title}}</title>
<link rel="icon" href="data:image/svg+xml,<svg xmlns=%22http://www.w3.org/2000/svg%22 viewBox=%220 0 100 100%22><text y=%22.9em%22 font-size=%2290%22>{{icon}}</text></svg>">
<style>
  body { font-family: sans-serif; max-width: 46rem; margin: 0 auto; padding: 1rem; display: flex; flex-direction: column; height: 100vh; box-sizing: border-box; }
  #messages { flex: 1; overflow-y: auto; }
  .turn { padding: .6rem .8rem; margin: .4rem 0; border-radius: .5rem; white-space: pre-wrap; }
  .turn.user { background: #f0f2f6; }
  .turn.assistant { background: #fff; border: 1px solid #e6e9ef; }
  .turn.error { background: #fdecea; color: #b71c1c; }
  .role { font-size: .75rem; color: #888; display: block; }
  #status { font-size: .8rem; color: #888; min-height: 1.2em; }
  form { display: flex; gap: .5rem; }
  #input { flex: 1; padding: .6rem; }
</style>
</head>
<body>
<h1>{{icon}} {{title}}</h1>
<div id="messages"></div>
<div id="status"></div>
<form id="chat-form">
  <input id="input" autocomplete="off" placeholder="{{placeholder}}">
  <button type="submit">➤</button>
</form>
<script>
(function () {
  var fixedUrl = {{ws_url}};
  var wsPort = {{ws_port}};
  var messages = document.getElementById("messages");
  var status = document.getElementById("status");
  var form = document.getElementById("chat-form");
  var input = document.getElementById("input");

  function socketUrl() {
    var url = fixedUrl;
    if (!url) {
      var scheme = location.protocol === "https:" ? "wss" : "ws";
      url = scheme + "://" + location.hostname + ":" + wsPort + "/";
    }
    var key = new URLSearchParams(location.search).get("api_key");
    if (key) {
      url += (url.indexOf("?") < 0 ? "?" : "&") + "api_key=" + encodeURIComponent(key);
    }
    return url;
  }

  function append(kind, label, text) {
    var div = document.createElement("div");
    div.className = "turn " + kind;
    var role = document.createElement("span");
    role.className = "role";
    role.textContent = label;
    div.appendChild(role);
    div.appendChild(document.createTextNode(text));
    messages.appendChild(div);
    messages.scrollTop = messages.scrollHeight;
  }

  var ws = new WebSocket(socketUrl());
  var busy = false;
  ws.onmessage = function (event) {
    var msg = JSON.parse(event.data);
    if (msg.type === "turn") {
      append(msg.role, msg.role, msg.content);
      if (msg.role === "assistant") { busy = false; status.textContent = ""; }
    } else if (msg.type === "processing") {
      status.textContent = "…";
    } else if (msg.type === "error") {
      append("error", "error", msg.message);
      busy = false;
      status.textContent = "";
    }
  };
  ws.onclose = function () { status.textContent = "disconnected"; };

  form.addEventListener("submit", function (event) {
    event.preventDefault();
    var text = input.value;
    if (!text.trim() || busy || ws.readyState !== WebSocket.OPEN) { return; }
    busy = true;
    ws.send(JSON.stringify({ type: "chat", content: text }));
    input.value = "";
  });
})();
</script>
</body>
</html>
"#;
