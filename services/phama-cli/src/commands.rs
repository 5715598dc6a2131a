//! One-shot subcommands.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast;

use phama_client::notice::SESSION_EXPIRED;
use phama_client::{ChatPage, ClientError, ImageFile, Notice};

use crate::render;

/// A failed action whose notice has already been printed.
///
/// `main` exits non-zero on it without printing anything further.
#[derive(Debug)]
pub struct Reported;

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("command failed")
    }
}

impl std::error::Error for Reported {}

/// Read a password without echo.
pub fn read_password(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    Ok(rpassword::read_password()?)
}

/// Print every notice raised so far.
pub fn drain_notices(rx: &mut broadcast::Receiver<Notice>) {
    drain_notices_to(rx, &mut io::stderr());
}

fn drain_notices_to(rx: &mut broadcast::Receiver<Notice>, out: &mut impl Write) -> usize {
    let mut shown = 0;
    while let Ok(notice) = rx.try_recv() {
        let _ = writeln!(out, "{}", render::notice(&notice));
        shown += 1;
    }
    shown
}

/// Print the notices an action raised and replace its error with
/// [`Reported`]. The error itself only goes to the log.
fn settle<T>(
    rx: &mut broadcast::Receiver<Notice>,
    result: phama_client::Result<T>,
    out: &mut impl Write,
) -> Result<T> {
    let shown = drain_notices_to(rx, out);
    result.map_err(|e| {
        tracing::debug!(kind = e.kind(), error = %e, "Command failed");
        if shown == 0 && matches!(e, ClientError::NotAuthenticated) {
            let _ = writeln!(out, "{}", render::notice(&Notice::error(SESSION_EXPIRED)));
        }
        Reported.into()
    })
}

async fn require_session(page: &ChatPage) -> Result<()> {
    if !page.session().is_authenticated().await {
        bail!("Not logged in. Run `phama login --username <name>` first.");
    }
    Ok(())
}

pub async fn login(page: &ChatPage, username: &str, password: Option<String>) -> Result<()> {
    if page.session().is_authenticated().await {
        println!("Already logged in. Run `phama logout` to switch accounts.");
        return Ok(());
    }

    let password = match password {
        Some(p) => p,
        None => read_password("Password: ")?,
    };

    let mut notices = page.subscribe_notices();
    let result = page.login(username, &password).await;
    settle(&mut notices, result, &mut io::stderr())?;

    let state = page.state().await;
    println!(
        "Logged in as {}.",
        state.user_name.as_deref().unwrap_or(username.trim())
    );
    Ok(())
}

pub async fn signup(
    page: &ChatPage,
    name: &str,
    username: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => {
            let first = read_password("Password: ")?;
            let second = read_password("Repeat password: ")?;
            if first != second {
                bail!("Passwords do not match");
            }
            first
        }
    };

    let mut notices = page.subscribe_notices();
    let result = page.signup(name, username, &password).await;
    settle(&mut notices, result, &mut io::stderr())?;
    Ok(())
}

pub async fn logout(page: &ChatPage) -> Result<()> {
    let mut notices = page.subscribe_notices();
    let outcome = page.logout().await;
    drain_notices(&mut notices);

    if outcome.backend_acknowledged {
        println!("Logged out.");
    } else {
        println!("Logged out locally.");
    }
    Ok(())
}

pub async fn history(page: &ChatPage) -> Result<()> {
    // The transcript was loaded when the session was restored
    require_session(page).await?;
    print!("{}", render::view(&page.state().await.view()));
    Ok(())
}

pub async fn send(page: &ChatPage, text: &str) -> Result<()> {
    require_session(page).await?;
    let mut notices = page.subscribe_notices();
    let result = page.send_text(text).await;

    if !settle(&mut notices, result, &mut io::stderr())? {
        bail!("Nothing to send");
    }
    print!("{}", render::view(&page.state().await.view()));
    Ok(())
}

pub async fn clear(page: &ChatPage) -> Result<()> {
    require_session(page).await?;
    let mut notices = page.subscribe_notices();
    let result = page.delete_all().await;
    settle(&mut notices, result, &mut io::stderr())?;
    Ok(())
}

pub async fn upload(page: &ChatPage, path: &Path) -> Result<()> {
    require_session(page).await?;
    let image = ImageFile::from_path(path)
        .await
        .with_context(|| format!("Cannot upload {}", path.display()))?;

    let mut notices = page.subscribe_notices();
    let result = page.handle_image_select(Some(image)).await;
    settle(&mut notices, result, &mut io::stderr())?;

    print!("{}", render::view(&page.state().await.view()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::time::Duration;

    use phama_client::{HttpGateway, MemoryCredentialStore};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Everything a failed login shows the user, plus the error `main` sees.
    async fn failed_login_output(base_url: &str) -> (String, String) {
        let gateway = HttpGateway::new(base_url, Duration::from_secs(2)).unwrap();
        let page = ChatPage::new(
            Arc::new(gateway),
            Arc::new(MemoryCredentialStore::new()),
            "pa-IN",
        );
        let mut notices = page.subscribe_notices();
        let result = page.login("alice", "pw").await;

        let mut out = Vec::new();
        let err = settle(&mut notices, result, &mut out).unwrap_err();
        assert!(err.is::<Reported>());
        (String::from_utf8(out).unwrap(), err.to_string())
    }

    #[tokio::test]
    async fn test_login_failure_output_hides_cause() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"detail": "Incorrect username or password"}"#),
            )
            .mount(&server)
            .await;
        let rejected = failed_login_output(&server.uri()).await;

        let closed = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let unreachable = failed_login_output(&closed).await;

        assert_eq!(rejected, unreachable);
        assert_eq!(
            rejected.0,
            "[error] Authentication failed. Please try again.\n"
        );
        assert!(!rejected.0.contains("Incorrect"));
    }

    #[test]
    fn test_settle_passes_success_through() {
        let notices = phama_client::notice::NoticeSender::new();
        let mut rx = notices.subscribe();
        notices.info("All messages have been deleted successfully!");

        let mut out = Vec::new();
        assert_eq!(settle(&mut rx, Ok(3), &mut out).unwrap(), 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[info] All messages have been deleted successfully!\n"
        );
    }

    #[test]
    fn test_settle_explains_silent_sign_out() {
        let notices = phama_client::notice::NoticeSender::new();
        let mut rx = notices.subscribe();

        let mut out = Vec::new();
        let result: phama_client::Result<()> = Err(ClientError::NotAuthenticated);
        assert!(settle(&mut rx, result, &mut out).is_err());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("[error] {SESSION_EXPIRED}\n")
        );
    }
}
