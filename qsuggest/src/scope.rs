//! Scoped acquisition of browser state.
//!
//! Each `with_*` helper acquires something, runs the body and releases it again on every exit
//! path: a normal return, a returned error and a panic. A panic is resumed once the release ran.

use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};

use anyhow::{Context, Result};
use futures_util::FutureExt;
use tracing::{error, warn};

use crate::browser::{AddonHandle, PrefValue, WindowId, ABOUT_BLANK};
use crate::context::ScenarioContext;

async fn bracket<R, T, B, BFut, Rel, RelFut>(resource: R, body: B, release: Rel) -> Result<T>
where
    R: Clone,
    B: FnOnce(R) -> BFut,
    BFut: Future<Output = Result<T>>,
    Rel: FnOnce(R) -> RelFut,
    RelFut: Future<Output = Result<()>>,
{
    let outcome = AssertUnwindSafe(body(resource.clone())).catch_unwind().await;
    let released = release(resource).await;

    match outcome {
        Err(panic) => {
            if let Err(err) = released {
                error!("release after panic failed: {err:#}");
            }
            resume_unwind(panic)
        }
        Ok(Err(err)) => {
            if let Err(release_err) = released {
                warn!("release after error failed: {release_err:#}");
            }
            Err(err)
        }
        Ok(Ok(value)) => {
            released?;
            Ok(value)
        }
    }
}

/// Installs the configured add-on for the duration of `body`.
pub async fn with_addon<T, B, BFut>(ctx: &ScenarioContext, body: B) -> Result<T>
where
    B: FnOnce(AddonHandle) -> BFut,
    BFut: Future<Output = Result<T>>,
{
    let handle = ctx
        .addons
        .install(&ctx.addon_path, ctx.expected_signed_state)
        .await
        .with_context(|| format!("installing add-on from {}", ctx.addon_path.display()))?;

    bracket(handle, body, |handle| async move {
        ctx.addons
            .uninstall(&handle)
            .await
            .with_context(|| format!("uninstalling add-on {}", handle.id))
    })
    .await
}

/// Runs `body` with the main window showing a blank page, and leaves it blank afterwards.
pub async fn with_blank_tab<T, B, BFut>(ctx: &ScenarioContext, body: B) -> Result<T>
where
    B: FnOnce(WindowId) -> BFut,
    BFut: Future<Output = Result<T>>,
{
    let window = ctx.window();
    load_blank(ctx, window).await?;

    bracket(window, body, |window| async move {
        ctx.ui.blur_urlbar(window).await?;
        load_blank(ctx, window).await
    })
    .await
}

/// Opens a new window for the duration of `body`.
pub async fn with_window<T, B, BFut>(ctx: &ScenarioContext, private: bool, body: B) -> Result<T>
where
    B: FnOnce(WindowId) -> BFut,
    BFut: Future<Output = Result<T>>,
{
    let window = ctx
        .ui
        .open_window(private)
        .await
        .context("opening window")?;

    bracket(window, body, |window| async move {
        ctx.ui.close_window(window).await
    })
    .await
}

async fn load_blank(ctx: &ScenarioContext, window: WindowId) -> Result<()> {
    ctx.ui.load_uri(window, ABOUT_BLANK).await?;
    ctx.navigation
        .await_load(window)
        .await
        .context("loading blank page")?;
    Ok(())
}

/// Sets the given preferences for the duration of `body`. Afterwards they are cleared back to
/// their defaults.
pub async fn with_prefs<T, B, BFut>(
    ctx: &ScenarioContext,
    prefs: &[(&str, PrefValue)],
    body: B,
) -> Result<T>
where
    B: FnOnce() -> BFut,
    BFut: Future<Output = Result<T>>,
{
    for (name, value) in prefs {
        ctx.prefs.set(name, value.clone());
    }

    bracket((), |()| body(), |()| async move {
        for (name, _) in prefs {
            ctx.prefs.clear(name);
        }
        Ok(())
    })
    .await
}
