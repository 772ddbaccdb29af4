/// Greeting returned by the `snowducks_info` scalar function.
///
/// Lives outside the extension-only `sql` module so the template stays
/// testable under the default (bundled) build.
#[must_use]
pub fn info_greeting(name: &str) -> String {
    format!("Snowducks {name} 🦆")
}
