//! Upload form page.

use axum::extract::State;
use axum::response::Html;

use crate::state::AppState;

const TITLE: &str = "Animal Classifier";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{TITLE}}</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; color: #222; }
  .upload { border: 2px dashed #bbb; border-radius: 8px; padding: 1.5rem; text-align: center; }
  #preview { max-width: 100%; max-height: 320px; margin-top: 1rem; display: none; }
  #result { margin-top: 1.5rem; min-height: 4rem; }
  .muted { color: #555; }
</style>
</head>
<body>
<h1>{{TITLE}}</h1>
<p class="muted">{{DESCRIPTION}}</p>
<form id="upload-form" class="upload" action="/classify" method="post" enctype="multipart/form-data">
  <label for="file">Upload an Animal Image</label><br>
  <input id="file" name="file" type="file" accept="image/*">
  <noscript><button type="submit">Classify</button></noscript>
  <br><img id="preview" alt="Uploaded image preview">
</form>
<div id="result"></div>
<script>
  const input = document.getElementById("file");
  const preview = document.getElementById("preview");
  const result = document.getElementById("result");
  input.addEventListener("change", async () => {
    const file = input.files[0];
    if (!file) { return; }
    preview.src = URL.createObjectURL(file);
    preview.style.display = "block";
    result.innerHTML = "<p class='muted'>Classifying…</p>";
    const body = new FormData();
    body.append("file", file);
    try {
      const response = await fetch("/classify", { method: "POST", body });
      result.innerHTML = await response.text();
    } catch (err) {
      result.textContent = "Request failed: " + err;
    }
  });
</script>
</body>
</html>
"#;

/// Render the upload page.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_page(
        state.service.classifier().name(),
        state.service.threshold(),
    ))
}

fn render_page(backend: &str, threshold: f64) -> String {
    let source = match backend {
        "remote" => "Images are sent to an external prediction API.",
        "local" => "Images are classified by a model running on this server.",
        _ => "Images are classified by the configured model.",
    };
    let description = format!(
        "Upload a photo of a cat, dog or wild animal. {} Predictions below {:.0}% confidence are reported as uncertain.",
        source,
        threshold * 100.0
    );

    PAGE_TEMPLATE
        .replace("{{TITLE}}", TITLE)
        .replace("{{DESCRIPTION}}", &description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_mentions_backend_and_threshold() {
        let page = render_page("local", 0.6);
        assert!(page.contains("<title>Animal Classifier</title>"));
        assert!(page.contains("running on this server"));
        assert!(page.contains("below 60% confidence"));
        assert!(page.contains(r#"name="file""#));
        assert!(!page.contains("{{"));
    }
}
