const IFRAME_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta http-equiv="X-UA-Compatible" content="IE=edge" />
  <meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
  <script src="{{ sockjs_url }}"></script>
  <script>
    document.domain = document.domain;
    SockJS.bootstrap_iframe();
  </script>
</head>
<body>
  <h2>Don't panic!</h2>
  <p>This is a SockJS hidden iframe. It's used for cross domain magic.</p>
</body>
</html>"#;

const HTMLFILE_HTML: &str = r#"<!doctype html>
<html><head>
  <meta http-equiv="X-UA-Compatible" content="IE=edge" />
  <meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
</head><body><h2>Don't panic!</h2>
  <script>
    document.domain = document.domain;
    var c = parent.{{ callback }};
    c.start();
    function p(d) {c.message(d);};
    window.onload = function() {c.stop();};
  </script>"#;

// old IE only starts rendering (and running scripts) after the first kilobyte
const HTMLFILE_MIN_PRELUDE: usize = 1024;

/// The bootstrap page served at `iframe.html`, loading the client from `sockjs_url`.
pub fn iframe_html(sockjs_url: &str) -> String {
    IFRAME_HTML.replace("{{ sockjs_url }}", sockjs_url)
}

/// The first chunk of an htmlfile response; `callback` must already be validated.
pub fn htmlfile_prelude(callback: &str) -> String {
    let mut prelude = HTMLFILE_HTML.replace("{{ callback }}", callback);
    let padding = HTMLFILE_MIN_PRELUDE.saturating_sub(prelude.len());
    prelude.extend(std::iter::repeat_n(' ', padding));
    prelude.push_str("\r\n\r\n");
    prelude
}
