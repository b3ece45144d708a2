//! Live reload: the event hub and the browser client.
//!
//! The watcher sends [`ReloadEvent`]s into a [`ReloadHub`]; every browser
//! connected to [`EVENTS_PATH`] receives them as Server-Sent Events.

use tokio::sync::broadcast;

/// SSE endpoint served next to the project files.
pub const EVENTS_PATH: &str = "/__webpipe/events";

const HUB_CAPACITY: usize = 16;

/// A change pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// Swap these root-relative URLs in place (stylesheets, images)
    Inject(Vec<String>),
    /// Reload the whole page
    Reload,
}

impl ReloadEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ReloadEvent::Inject(_) => "inject",
            ReloadEvent::Reload => "reload",
        }
    }

    /// SSE data line.
    pub fn data(&self) -> String {
        match self {
            ReloadEvent::Inject(urls) => serde_json::to_string(urls).unwrap_or_else(|_| "[]".to_string()),
            ReloadEvent::Reload => "reload".to_string(),
        }
    }
}

/// Fan-out of reload events to any number of browsers.
///
/// Cloning a hub yields another handle to the same channel. Sending never
/// blocks; browsers that fall too far behind miss events.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadEvent>,
}

impl ReloadHub {
    /// Create a hub with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    /// Push an event; returns how many browsers were connected.
    pub fn send(&self, event: ReloadEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.sender.subscribe()
    }

    /// Number of connected browsers.
    pub fn clients(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

const CLIENT_SCRIPT: &str = r#"(function () {
  var source = new EventSource('__EVENTS__');

  function strip(url) {
    return url.split('?')[0].replace(/^\.?\//, '');
  }

  function bust(el, attr, target) {
    var current = el.getAttribute(attr);
    if (current && strip(current) === target) {
      el.setAttribute(attr, current.split('?')[0] + '?v=' + Date.now());
      return 1;
    }
    return 0;
  }

  function notify(text) {
    if (!window.__webpipeNotify) return;
    var box = document.createElement('div');
    box.textContent = text;
    box.style.cssText = 'position:fixed;top:0;right:0;z-index:2147483647;padding:8px 12px;' +
      'font:12px sans-serif;color:#fff;background:rgba(0,0,0,.75)';
    document.body.appendChild(box);
    setTimeout(function () { box.remove(); }, 1500);
  }

  source.addEventListener('inject', function (e) {
    var urls = JSON.parse(e.data);
    var swapped = 0;
    urls.forEach(function (url) {
      var target = strip(url);
      document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
        swapped += bust(link, 'href', target);
      });
      document.querySelectorAll('img').forEach(function (img) {
        swapped += bust(img, 'src', target);
      });
    });
    if (swapped === 0) {
      location.reload();
      return;
    }
    notify('Injected: ' + urls.join(', '));
  });

  source.addEventListener('reload', function () {
    location.reload();
  });
})();
"#;

/// The `<script>` block injected into served pages.
pub fn client_script(notify: bool) -> String {
    format!(
        "<script>window.__webpipeNotify = {};\n{}</script>",
        notify,
        CLIENT_SCRIPT.replace("__EVENTS__", EVENTS_PATH)
    )
}

/// Insert `script` before the last `</body>`, or append it when the page
/// has no body end tag.
pub fn inject_client(html: &str, script: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..pos]);
            out.push_str(script);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{}{}", html, script),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let inject = ReloadEvent::Inject(vec!["style.css".to_string(), "img/a.png".to_string()]);
        assert_eq!(inject.name(), "inject");
        assert_eq!(inject.data(), r#"["style.css","img/a.png"]"#);
        assert_eq!(ReloadEvent::Reload.name(), "reload");
    }

    #[test]
    fn test_hub_fans_out() {
        let hub = ReloadHub::new();
        assert_eq!(hub.send(ReloadEvent::Reload), 0);

        let mut a = hub.subscribe();
        let mut b = hub.clone().subscribe();
        assert_eq!(hub.clients(), 2);
        assert_eq!(hub.send(ReloadEvent::Reload), 2);
        assert_eq!(a.try_recv().unwrap(), ReloadEvent::Reload);
        assert_eq!(b.try_recv().unwrap(), ReloadEvent::Reload);
    }

    #[test]
    fn test_inject_before_body_end() {
        let html = "<html><body><p>hi</p></BODY></html>";
        let out = inject_client(html, "<script>x</script>");
        assert_eq!(out, "<html><body><p>hi</p><script>x</script></BODY></html>");
    }

    #[test]
    fn test_inject_without_body() {
        assert_eq!(inject_client("<p>partial</p>", "<s/>"), "<p>partial</p><s/>");
    }

    #[test]
    fn test_client_script() {
        let script = client_script(true);
        assert!(script.starts_with("<script>window.__webpipeNotify = true;"));
        assert!(script.contains("new EventSource('/__webpipe/events')"));
        assert!(script.ends_with("</script>"));
    }
}
