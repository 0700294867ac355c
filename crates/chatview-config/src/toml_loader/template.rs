//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Chat view theme runtime configuration
# Only override what you want to change -- missing fields use defaults.

[runtime]
# load_timeout_ms = 10000        # theme handshake deadline
# generation_timeout_ms = 15000  # per-session html deadline
# js_namespace = "psi"
# case_insensitive_fs = false

[server]
# base_url = "http://127.0.0.1:7878/"

[themes]
# search_paths = ["/usr/share/chatview/themes"]

[options]
# Values themes read through psiOption(), e.g.
# [options.ui.chat]
# avatars = true

[colors]
# "messages.received" = "#5297a8"
"##
    .to_string()
}
