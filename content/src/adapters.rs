//! Per-site integration descriptors.
//!
//! [`resolve`] walks an ordered rule table; the first rule whose predicate
//! accepts the page location wins, and anything unmatched gets the
//! [`GENERIC`] adapter. Adapters are plain data: selector lists plus an
//! [`InsertionProcedure`] naming which strategy the insertion executor runs.

use std::time::Duration;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    Discord,
    X,
    XDirectMessages,
    Instagram,
    Reddit,
    WhatsApp,
    Telegram,
    Slack,
    Teams,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

/// How the send control is triggered once the upload settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendActivation {
    /// Click the first element matching one of the selectors.
    Click(&'static [&'static str]),
    /// Dispatch Enter on the first editable element matching one of the
    /// selectors (inside the container when one is found).
    EnterKey(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSteps {
    /// Searched inside the adapter container first, then document-wide.
    pub file_input_selectors: &'static [&'static str],
    pub file_name: &'static str,
    pub settle_delay: Duration,
    pub send: SendActivation,
    /// Append the raw URL to the composer when the upload path fails.
    pub text_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionProcedure {
    Upload(UploadSteps),
    /// Append ` <url>` to the composer text.
    PlainText,
    /// Append a markdown image reference to the composer text.
    MarkdownImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteAdapter {
    pub site: Site,
    pub site_name: &'static str,
    pub input_selector: &'static str,
    pub container_selector: &'static str,
    pub theme: Theme,
    pub insertion: InsertionProcedure,
}

const GIF_FILE: &str = "gif.gif";
const DEFAULT_SETTLE: Duration = Duration::from_millis(1500);
const FILE_INPUT: &[&str] = &[r#"input[type="file"]"#];

pub const DISCORD: SiteAdapter = SiteAdapter {
    site: Site::Discord,
    site_name: "Discord",
    input_selector: r#"[class*="channelTextArea"] [class*="slateTextArea"]"#,
    container_selector: r#"[class*="channelTextArea"]"#,
    theme: Theme::Dark,
    insertion: InsertionProcedure::Upload(UploadSteps {
        file_input_selectors: FILE_INPUT,
        file_name: GIF_FILE,
        settle_delay: DEFAULT_SETTLE,
        send: SendActivation::EnterKey(&[r#"[contenteditable="true"]"#]),
        text_fallback: false,
    }),
};

pub const X: SiteAdapter = SiteAdapter {
    site: Site::X,
    site_name: "X",
    input_selector: r#"[data-testid="tweetTextarea_0"], [contenteditable="true"][role="textbox"]"#,
    container_selector: r#"[data-testid="toolBar"], [class*="composeTextarea"]"#,
    theme: Theme::Light,
    insertion: InsertionProcedure::Upload(UploadSteps {
        file_input_selectors: &[r#"[data-testid="fileInput"]"#, r#"input[type="file"]"#],
        file_name: GIF_FILE,
        settle_delay: Duration::from_millis(2000),
        send: SendActivation::Click(&[
            r#"[data-testid="tweetButton"]"#,
            r#"[data-testid="tweetButtonInline"]"#,
        ]),
        text_fallback: false,
    }),
};

/// Send control of the X direct-message composer.
pub const X_DM_SEND_BUTTON: &str = r#"[data-testid="dmComposerSendButton"]"#;

pub const X_DIRECT_MESSAGES: SiteAdapter = SiteAdapter {
    site: Site::XDirectMessages,
    site_name: "X Messages",
    input_selector: r#"[data-testid="dmComposerTextInput"]"#,
    container_selector: r#"[data-testid="DmActivityContainer"]"#,
    theme: Theme::Light,
    insertion: InsertionProcedure::Upload(UploadSteps {
        file_input_selectors: &[r#"[data-testid="dmComposerAttachmentInput"]"#, r#"input[type="file"]"#],
        file_name: GIF_FILE,
        settle_delay: Duration::from_millis(2000),
        send: SendActivation::Click(&[X_DM_SEND_BUTTON]),
        text_fallback: false,
    }),
};

pub const INSTAGRAM: SiteAdapter = SiteAdapter {
    site: Site::Instagram,
    site_name: "Instagram",
    input_selector: r#"textarea[placeholder*="comment"], [contenteditable="true"][role="textbox"]"#,
    container_selector: r#"form[role="search"], [role="dialog"]"#,
    theme: Theme::Light,
    insertion: InsertionProcedure::Upload(UploadSteps {
        file_input_selectors: FILE_INPUT,
        file_name: GIF_FILE,
        settle_delay: DEFAULT_SETTLE,
        send: SendActivation::Click(&[
            r#"button[type="submit"]"#,
            r#"button[aria-label*="Post"]"#,
            r#"button[aria-label*="Share"]"#,
            r#"button[aria-label*="Send"]"#,
        ]),
        text_fallback: true,
    }),
};

pub const REDDIT: SiteAdapter = SiteAdapter {
    site: Site::Reddit,
    site_name: "Reddit",
    input_selector: r#"[contenteditable="true"], textarea[placeholder*="comment"]"#,
    container_selector: r#"[class*="CommentForm"], [class*="SubmitPage"]"#,
    theme: Theme::Light,
    insertion: InsertionProcedure::MarkdownImage,
};

pub const WHATSAPP: SiteAdapter = SiteAdapter {
    site: Site::WhatsApp,
    site_name: "WhatsApp",
    input_selector: r#"[contenteditable="true"][data-tab="10"]"#,
    container_selector: r#"[class*="input-container"]"#,
    theme: Theme::Light,
    insertion: InsertionProcedure::Upload(UploadSteps {
        file_input_selectors: FILE_INPUT,
        file_name: "animation.gif",
        settle_delay: DEFAULT_SETTLE,
        send: SendActivation::Click(&[
            r#"[data-testid="send"]"#,
            r#"[data-icon="send"]"#,
            r#"[aria-label="Send"]"#,
        ]),
        text_fallback: false,
    }),
};

pub const TELEGRAM: SiteAdapter = SiteAdapter {
    site: Site::Telegram,
    site_name: "Telegram",
    input_selector: r#".input-message-input[contenteditable="true"]"#,
    container_selector: ".chat-input",
    theme: Theme::Light,
    insertion: InsertionProcedure::Upload(UploadSteps {
        file_input_selectors: FILE_INPUT,
        file_name: GIF_FILE,
        settle_delay: DEFAULT_SETTLE,
        send: SendActivation::Click(&[
            ".btn-send",
            r#"[data-testid="send"]"#,
            r#"[aria-label="Send"]"#,
        ]),
        text_fallback: false,
    }),
};

pub const SLACK: SiteAdapter = SiteAdapter {
    site: Site::Slack,
    site_name: "Slack",
    input_selector: r#"[data-qa="message_input"] [contenteditable="true"]"#,
    container_selector: r#"[data-qa="message_input"]"#,
    theme: Theme::Light,
    insertion: InsertionProcedure::Upload(UploadSteps {
        file_input_selectors: FILE_INPUT,
        file_name: GIF_FILE,
        settle_delay: DEFAULT_SETTLE,
        send: SendActivation::Click(&[
            r#"[data-qa="texty_send_button"]"#,
            r#"[aria-label="Send message"]"#,
        ]),
        text_fallback: false,
    }),
};

pub const TEAMS: SiteAdapter = SiteAdapter {
    site: Site::Teams,
    site_name: "Teams",
    input_selector: r#"[data-tid="ckeditor"][contenteditable="true"]"#,
    container_selector: r#"[data-tid="message-pane-footer"]"#,
    theme: Theme::Light,
    insertion: InsertionProcedure::Upload(UploadSteps {
        file_input_selectors: FILE_INPUT,
        file_name: GIF_FILE,
        settle_delay: DEFAULT_SETTLE,
        send: SendActivation::Click(&[r#"[data-tid="send-button"]"#, r#"[aria-label="Send"]"#]),
        text_fallback: false,
    }),
};

pub const GENERIC: SiteAdapter = SiteAdapter {
    site: Site::Generic,
    site_name: "Generic",
    input_selector: r#"[contenteditable="true"], textarea, input[type="text"]"#,
    container_selector: "body",
    theme: Theme::Light,
    insertion: InsertionProcedure::PlainText,
};

struct AdapterRule {
    hosts: &'static [&'static str],
    /// Consulted only after a host matched; `None` accepts every path.
    path_branch: Option<fn(&str) -> SiteAdapter>,
    adapter: SiteAdapter,
}

fn x_adapter_for_path(path: &str) -> SiteAdapter {
    if path.starts_with("/messages") || path.starts_with("/i/chat") {
        X_DIRECT_MESSAGES
    } else {
        X
    }
}

const RULES: &[AdapterRule] = &[
    AdapterRule {
        hosts: &["discord.com", "ptb.discord.com", "canary.discord.com"],
        path_branch: None,
        adapter: DISCORD,
    },
    AdapterRule {
        hosts: &["twitter.com", "x.com", "mobile.twitter.com", "mobile.x.com"],
        path_branch: Some(x_adapter_for_path),
        adapter: X,
    },
    AdapterRule {
        hosts: &["www.instagram.com", "instagram.com"],
        path_branch: None,
        adapter: INSTAGRAM,
    },
    AdapterRule {
        hosts: &["www.reddit.com", "reddit.com", "old.reddit.com"],
        path_branch: None,
        adapter: REDDIT,
    },
    AdapterRule {
        hosts: &["web.whatsapp.com"],
        path_branch: None,
        adapter: WHATSAPP,
    },
    AdapterRule {
        hosts: &["web.telegram.org"],
        path_branch: None,
        adapter: TELEGRAM,
    },
    AdapterRule {
        hosts: &["app.slack.com"],
        path_branch: None,
        adapter: SLACK,
    },
    AdapterRule {
        hosts: &["teams.microsoft.com", "teams.live.com"],
        path_branch: None,
        adapter: TEAMS,
    },
];

/// Picks the adapter for a page location. Hostnames compare
/// case-insensitively; no rule ever yields more than one adapter.
pub fn resolve(hostname: &str, path: &str) -> SiteAdapter {
    let hostname = hostname.trim_end_matches('.').to_ascii_lowercase();
    RULES
        .iter()
        .find(|rule| rule.hosts.contains(&hostname.as_str()))
        .map_or(GENERIC, |rule| match rule.path_branch {
            Some(branch) => branch(path),
            None => rule.adapter,
        })
}

/// Like [`resolve`], starting from the page's full URL.
pub fn resolve_url(href: &str) -> SiteAdapter {
    match Url::parse(href) {
        Ok(url) => resolve(url.host_str().unwrap_or_default(), url.path()),
        Err(err) => {
            tracing::debug!("unparsable page location {href:?}: {err}");
            GENERIC
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn discord_matches_regardless_of_path() {
        for path in ["/", "/channels/@me", "/channels/123/456", "/login"] {
            assert_eq!(resolve("discord.com", path).site, Site::Discord);
        }
    }

    #[test]
    fn unknown_host_gets_generic_adapter() {
        let adapter = resolve("news.example.org", "/comments");
        assert_eq!(adapter, GENERIC);
        assert_eq!(adapter.insertion, InsertionProcedure::PlainText);
        assert_eq!(adapter.container_selector, "body");
    }

    #[test]
    fn x_branches_on_direct_message_path() {
        assert_eq!(resolve("x.com", "/home").site, Site::X);
        assert_eq!(resolve("twitter.com", "/compose/post").site, Site::X);
        assert_eq!(resolve("x.com", "/messages").site, Site::XDirectMessages);
        assert_eq!(
            resolve("twitter.com", "/messages/123-456").site,
            Site::XDirectMessages
        );
    }

    #[test]
    fn hostname_match_is_exact() {
        assert_eq!(resolve("notdiscord.com", "/").site, Site::Generic);
        assert_eq!(resolve("discord.com.evil.net", "/").site, Site::Generic);
        assert_eq!(resolve("DISCORD.COM.", "/").site, Site::Discord);
    }

    #[test]
    fn resolves_from_full_url() {
        assert_eq!(
            resolve_url("https://web.whatsapp.com/").site,
            Site::WhatsApp
        );
        assert_eq!(
            resolve_url("https://x.com/messages/compose").site,
            Site::XDirectMessages
        );
        assert_eq!(resolve_url("not a url").site, Site::Generic);
    }

    #[test]
    fn only_instagram_falls_back_to_text() {
        let with_fallback: Vec<Site> = RULES
            .iter()
            .map(|rule| rule.adapter)
            .chain([X_DIRECT_MESSAGES, GENERIC])
            .filter(|adapter| {
                matches!(
                    adapter.insertion,
                    InsertionProcedure::Upload(UploadSteps {
                        text_fallback: true,
                        ..
                    })
                )
            })
            .map(|adapter| adapter.site)
            .collect();
        assert_eq!(with_fallback, vec![Site::Instagram]);
    }
}
