use axum::response::Html;

use crate::chat::prompts::WEB_INPUT_PLACEHOLDER;

const PLACEHOLDER_TOKEN: &str = "__INPUT_PLACEHOLDER__";

const CHAT_PAGE_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Movie Chat</title>
  <style>
    *, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: system-ui, -apple-system, sans-serif;
      background: #0e1117; color: #fafafa;
      display: flex; flex-direction: column; align-items: center;
      min-height: 100vh;
    }
    main { width: 100%; max-width: 46rem; padding: 3rem 1rem 7rem; }
    h1 { font-size: 2.2rem; margin-bottom: 1.5rem; }
    .msg { display: flex; gap: 0.75rem; padding: 0.9rem 1rem; border-radius: 10px; margin-bottom: 0.6rem; }
    .msg .who { flex: none; width: 2rem; height: 2rem; border-radius: 6px; display: grid; place-items: center; font-size: 0.8rem; }
    .msg.ai { background: #262730; }
    .msg.ai .who { background: #ffbd45; color: #0e1117; }
    .msg.human .who { background: #ff4b4b; }
    .msg .text { white-space: pre-wrap; line-height: 1.5; }
    .meta { color: #888; font-size: 0.85rem; }
    form {
      position: fixed; bottom: 0; width: 100%; max-width: 46rem;
      padding: 1rem; background: #0e1117;
    }
    input {
      width: 100%; padding: 0.8rem 1rem; border-radius: 10px;
      border: 1px solid #333; background: #262730; color: #fafafa; font-size: 1rem;
    }
    input:disabled { opacity: 0.6; }
  </style>
</head>
<body>
  <main>
    <h1>Movie Chat</h1>
    <div id="messages"></div>
  </main>
  <form id="chat">
    <input id="question" autocomplete="off" placeholder="__INPUT_PLACEHOLDER__" />
  </form>
  <script>
    const list = document.getElementById("messages");
    const form = document.getElementById("chat");
    const input = document.getElementById("question");
    let sessionId = sessionStorage.getItem("movie-chat-session");

    function add(role, text, extraClass) {
      const row = document.createElement("div");
      row.className = "msg " + (role === "human" ? "human" : "ai") + (extraClass ? " " + extraClass : "");
      const who = document.createElement("div");
      who.className = "who";
      who.textContent = role === "human" ? "You" : "AI";
      const body = document.createElement("div");
      body.className = "text";
      body.textContent = text;
      row.append(who, body);
      list.append(row);
      window.scrollTo(0, document.body.scrollHeight);
      return row;
    }

    function render(data) {
      sessionId = data.session_id;
      sessionStorage.setItem("movie-chat-session", sessionId);
      list.replaceChildren();
      for (const m of data.messages) {
        if (m.role !== "system") add(m.role, m.content);
      }
    }

    async function load() {
      const query = sessionId ? "?session_id=" + encodeURIComponent(sessionId) : "";
      const res = await fetch("/api/history" + query);
      render(await res.json());
    }

    form.addEventListener("submit", async (event) => {
      event.preventDefault();
      const message = input.value.trim();
      if (!message) return;
      input.value = "";
      input.disabled = true;
      if (message !== "q") add("human", message);
      const thinking = add("ai", "Thinking...", "meta");
      try {
        const res = await fetch("/api/chat", {
          method: "POST",
          headers: { "Content-Type": "application/json" },
          body: JSON.stringify({ session_id: sessionId, message }),
        });
        const data = await res.json();
        if (!res.ok) {
          thinking.remove();
          add("ai", data.message || "Something went wrong.", "meta");
        } else {
          render(data);
          if (data.processing_time !== undefined) {
            add("ai", "Processing time: " + data.processing_time.toFixed(2) + " seconds", "meta");
          }
        }
      } catch (err) {
        thinking.remove();
        add("ai", "Request failed: " + err, "meta");
      } finally {
        input.disabled = false;
        input.focus();
      }
    });

    load();
  </script>
</body>
</html>
"#;

/// GET /
pub(super) async fn index() -> Html<String> {
    Html(render_page())
}

pub(super) fn render_page() -> String {
    CHAT_PAGE_HTML.replace(PLACEHOLDER_TOKEN, WEB_INPUT_PLACEHOLDER)
}
