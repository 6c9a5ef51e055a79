//! Playwright browser automation
//!
//! The browser is driven by a long-lived Node process running a generated
//! bridge script. Requests and replies are single JSON lines on the bridge's
//! stdin and stdout, correlated by request id, so several pages can share
//! one browser while each scenario keeps its own context.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command as StdCommand, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::{duration_ms, Timeouts};
use crate::error::{E2eError, E2eResult};
use crate::locator::{DialogPolicy, Expectation, Locator, ResponseMatcher, WaitState};
use crate::page::{Page, PageFactory};

/// Extra time granted to the bridge beyond the engine-side timeout
const REPLY_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport: Viewport,

    /// Node executable
    pub node_binary: PathBuf,

    /// Directory whose `node_modules` provides `@playwright/test`
    pub project_dir: PathBuf,

    /// Delay inserted by Playwright between operations
    #[serde(with = "duration_ms", rename = "slow_mo_ms")]
    pub slow_mo: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport: Viewport {
                width: 1280,
                height: 720,
            },
            node_binary: PathBuf::from("node"),
            project_dir: PathBuf::from("."),
            slow_mo: Duration::ZERO,
        }
    }
}

/// Requests understood by the bridge script
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command<'a> {
    NewPage {
        viewport: Viewport,
        timeout_ms: u64,
        navigation_timeout_ms: u64,
    },
    Goto {
        url: &'a str,
    },
    Reload,
    Click {
        locator: &'a Locator,
        timeout_ms: u64,
    },
    Fill {
        locator: &'a Locator,
        value: &'a str,
        timeout_ms: u64,
    },
    IsVisible {
        locator: &'a Locator,
    },
    Count {
        locator: &'a Locator,
    },
    InnerTexts {
        locator: &'a Locator,
    },
    WaitFor {
        locator: &'a Locator,
        state: WaitState,
        timeout_ms: u64,
    },
    Expect {
        locator: &'a Locator,
        expectation: &'a Expectation,
        timeout_ms: u64,
    },
    ClickAndWaitForResponse {
        locator: &'a Locator,
        matcher: &'a ResponseMatcher,
        timeout_ms: u64,
    },
    SetDialogPolicy {
        policy: DialogPolicy,
    },
    ClosePage,
    Shutdown,
}

impl Command<'_> {
    fn describe(&self) -> String {
        match self {
            Command::NewPage { .. } => "new page".to_string(),
            Command::Goto { url } => format!("goto {}", url),
            Command::Reload => "reload".to_string(),
            Command::Click { locator, .. } => format!("click {}", locator),
            Command::Fill { locator, .. } => format!("fill {}", locator),
            Command::IsVisible { locator } => format!("visibility of {}", locator),
            Command::Count { locator } => format!("count of {}", locator),
            Command::InnerTexts { locator } => format!("texts of {}", locator),
            Command::WaitFor { locator, state, .. } => format!("wait for {} {}", locator, state),
            Command::Expect { locator, expectation, .. } => {
                format!("{} {}", locator, expectation)
            }
            Command::ClickAndWaitForResponse { matcher, .. } => {
                format!("response {}", matcher)
            }
            Command::SetDialogPolicy { .. } => "dialog policy".to_string(),
            Command::ClosePage => "close page".to_string(),
            Command::Shutdown => "shutdown".to_string(),
        }
    }
}

/// One line written by the bridge
#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<BridgeFailure>,
}

#[derive(Debug, Deserialize)]
struct BridgeFailure {
    kind: String,
    message: String,
}

impl BridgeFailure {
    fn into_error(self, what: &str) -> E2eError {
        match self.kind.as_str() {
            "timeout" => E2eError::Timeout(format!("{}: {}", what, self.message)),
            "assertion" => E2eError::AssertionFailed(format!("{}: {}", what, self.message)),
            "unhandled_dialog" => E2eError::UnhandledDialog(self.message),
            "protocol" => E2eError::Bridge(self.message),
            _ => E2eError::Playwright(format!("{}: {}", what, self.message)),
        }
    }
}

impl Reply {
    fn into_result(self, what: &str) -> E2eResult<serde_json::Value> {
        if self.ok {
            return Ok(self.value);
        }
        Err(self
            .error
            .map(|f| f.into_error(what))
            .unwrap_or_else(|| E2eError::Bridge(format!("{} failed without detail", what))))
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// The running Node process
struct Bridge {
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Pending,
    next_id: AtomicU64,
    child: Mutex<Child>,
    reply_grace: Duration,
    _script_dir: Option<tempfile::TempDir>,
}

impl Bridge {
    /// Spawn the bridge process and start routing its replies.
    ///
    /// The returned receiver resolves with the ready line (id 0).
    fn start(
        mut command: TokioCommand,
        script_dir: Option<tempfile::TempDir>,
        reply_grace: Duration,
    ) -> E2eResult<(Self, oneshot::Receiver<Reply>)> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn bridge: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[bridge stderr] {}", line);
                }
            });
        }

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (ready_tx, ready_rx) = oneshot::channel();
        pending.lock().insert(0, ready_tx);
        tokio::spawn(read_replies(stdout, pending.clone()));

        let bridge = Bridge {
            stdin: tokio::sync::Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            child: Mutex::new(child),
            reply_grace,
            _script_dir: script_dir,
        };
        Ok((bridge, ready_rx))
    }

    async fn call(
        &self,
        page: Option<u64>,
        command: Command<'_>,
        timeout: Duration,
    ) -> E2eResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let what = command.describe();

        let mut request = serde_json::to_value(&command)?;
        request["id"] = id.into();
        if let Some(page) = page {
            request["page"] = page.into();
        }
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        debug!("bridge -> #{} {}", id, what);
        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                self.pending.lock().remove(&id);
                return Err(E2eError::Bridge(format!("write failed: {}", e)));
            }
            stdin.flush().await?;
        }

        match tokio::time::timeout(timeout + self.reply_grace, rx).await {
            Ok(Ok(reply)) => reply.into_result(&what),
            Ok(Err(_)) => Err(E2eError::Bridge("bridge process exited".to_string())),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(E2eError::Timeout(what))
            }
        }
    }
}

/// Route replies to their waiting callers until the bridge closes stdout
async fn read_replies(stdout: ChildStdout, pending: Pending) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match serde_json::from_str::<Reply>(&line) {
            Ok(reply) => {
                let waiter = pending.lock().remove(&reply.id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(reply);
                    }
                    None => debug!("bridge <- late reply #{}", reply.id),
                }
            }
            Err(_) => debug!("[bridge] {}", line),
        }
    }
    // Dropping the senders wakes every caller with an error.
    pending.lock().clear();
}

/// A browser instance shared by all pages of a run
pub struct PlaywrightBrowser {
    bridge: Arc<Bridge>,
    config: PlaywrightConfig,
    timeouts: Timeouts,
}

impl PlaywrightBrowser {
    /// Launch the bridge and wait until the browser is up
    pub async fn launch(config: PlaywrightConfig, timeouts: Timeouts) -> E2eResult<Self> {
        Self::check_playwright_installed(&config)?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, bridge_script(&config))?;

        info!("Launching {} via Playwright bridge", config.browser.as_str());

        let mut command = TokioCommand::new(&config.node_binary);
        command.arg(&script_path).current_dir(&config.project_dir);
        let (bridge, ready_rx) = Bridge::start(command, Some(script_dir), REPLY_GRACE)?;

        match tokio::time::timeout(timeouts.navigation, ready_rx).await {
            Ok(Ok(reply)) => {
                reply.into_result("browser launch")?;
            }
            Ok(Err(_)) => {
                return Err(E2eError::Playwright(
                    "bridge exited before the browser launched".to_string(),
                ))
            }
            Err(_) => return Err(E2eError::Timeout("browser launch".to_string())),
        }

        Ok(Self {
            bridge: Arc::new(bridge),
            config,
            timeouts,
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let output = StdCommand::new("npx")
            .args(["playwright", "--version"])
            .current_dir(&config.project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Close the browser and reap the bridge
    pub async fn close(self) -> E2eResult<()> {
        let result = self
            .bridge
            .call(None, Command::Shutdown, self.timeouts.action)
            .await;
        if let Err(e) = &result {
            warn!("Bridge shutdown failed: {}", e);
        }
        let _ = self.bridge.child.lock().start_kill();
        result.map(|_| ())
    }
}

#[async_trait]
impl PageFactory for PlaywrightBrowser {
    async fn new_page(&self) -> E2eResult<Box<dyn Page>> {
        let value = self
            .bridge
            .call(
                None,
                Command::NewPage {
                    viewport: self.config.viewport,
                    timeout_ms: millis(self.timeouts.action),
                    navigation_timeout_ms: millis(self.timeouts.navigation),
                },
                self.timeouts.navigation,
            )
            .await?;
        let id = value
            .get("page")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| E2eError::Bridge(format!("bad new_page reply: {}", value)))?;

        Ok(Box::new(PlaywrightPage {
            bridge: self.bridge.clone(),
            id,
            timeouts: self.timeouts,
        }))
    }
}

/// A page living in the bridge process
pub struct PlaywrightPage {
    bridge: Arc<Bridge>,
    id: u64,
    timeouts: Timeouts,
}

impl PlaywrightPage {
    async fn call(&self, command: Command<'_>, timeout: Duration) -> E2eResult<serde_json::Value> {
        self.bridge.call(Some(self.id), command, timeout).await
    }
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.call(Command::Goto { url }, self.timeouts.navigation).await?;
        Ok(())
    }

    async fn reload(&self) -> E2eResult<()> {
        self.call(Command::Reload, self.timeouts.navigation).await?;
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        self.call(Command::Click { locator, timeout_ms: millis(timeout) }, timeout)
            .await?;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        self.call(
            Command::Fill { locator, value, timeout_ms: millis(timeout) },
            timeout,
        )
        .await?;
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        let value = self.call(Command::IsVisible { locator }, self.timeouts.action).await?;
        value
            .as_bool()
            .ok_or_else(|| E2eError::Bridge(format!("expected bool, got {}", value)))
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        let value = self.call(Command::Count { locator }, self.timeouts.action).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| E2eError::Bridge(format!("expected count, got {}", value)))
    }

    async fn inner_texts(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        let value = self.call(Command::InnerTexts { locator }, self.timeouts.action).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        state: WaitState,
        timeout: Duration,
    ) -> E2eResult<()> {
        self.call(
            Command::WaitFor { locator, state, timeout_ms: millis(timeout) },
            timeout,
        )
        .await?;
        Ok(())
    }

    async fn expect(
        &self,
        locator: &Locator,
        expectation: &Expectation,
        timeout: Duration,
    ) -> E2eResult<()> {
        self.call(
            Command::Expect { locator, expectation, timeout_ms: millis(timeout) },
            timeout,
        )
        .await?;
        Ok(())
    }

    async fn click_and_wait_for_response(
        &self,
        locator: &Locator,
        matcher: &ResponseMatcher,
        timeout: Duration,
    ) -> E2eResult<serde_json::Value> {
        self.call(
            Command::ClickAndWaitForResponse { locator, matcher, timeout_ms: millis(timeout) },
            timeout,
        )
        .await
    }

    async fn set_dialog_policy(&self, policy: DialogPolicy) -> E2eResult<()> {
        self.call(Command::SetDialogPolicy { policy }, self.timeouts.action).await?;
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        self.call(Command::ClosePage, self.timeouts.action).await?;
        Ok(())
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// Build the bridge script for the configured browser
pub fn bridge_script(config: &PlaywrightConfig) -> String {
    let mut script = format!(
        r#"
const readline = require('readline');
const pw = require(require.resolve('@playwright/test', {{ paths: [process.cwd()] }}));
const {{ expect }} = pw;
const browserType = pw.{browser};
const launchOptions = {{ headless: {headless}, slowMo: {slow_mo} }};
"#,
        browser = config.browser.as_str(),
        headless = config.headless,
        slow_mo = millis(config.slow_mo),
    );
    script.push_str(BRIDGE_BODY);
    script
}

const BRIDGE_BODY: &str = r#"
class BridgeError extends Error {
  constructor(kind, message) {
    super(message);
    this.kind = kind;
  }
}

const pages = new Map();
let nextPage = 1;

function reply(msg) {
  process.stdout.write(JSON.stringify(msg) + '\n');
}

function resolve(page, spec) {
  const scope = spec.parent ? resolve(page, spec.parent) : page;
  let loc;
  switch (spec.by.kind) {
    case 'role': loc = scope.getByRole(spec.by.role, { name: spec.by.name, exact: !!spec.by.exact }); break;
    case 'label': loc = scope.getByLabel(spec.by.text); break;
    case 'text': loc = scope.getByText(spec.by.text, { exact: !!spec.by.exact }); break;
    case 'test_id': loc = scope.getByTestId(spec.by.id); break;
    default: throw new BridgeError('protocol', 'unknown locator kind ' + spec.by.kind);
  }
  if (spec.has_text != null) loc = loc.filter({ hasText: spec.has_text });
  if (spec.nth != null) loc = loc.nth(spec.nth);
  return loc;
}

function classify(err) {
  if (err instanceof BridgeError) return { kind: err.kind, message: err.message };
  if (err && err.matcherResult) return { kind: 'assertion', message: err.message };
  if (err && err.name === 'TimeoutError') return { kind: 'timeout', message: err.message };
  return { kind: 'playwright', message: String((err && err.message) || err) };
}

function assertExpectation(loc, exp, timeout) {
  const e = expect(loc);
  switch (exp.kind) {
    case 'visible': return e.toBeVisible({ timeout });
    case 'hidden': return e.toBeHidden({ timeout });
    case 'text': return e.toHaveText(exp.value, { timeout });
    case 'contains_text': return e.toContainText(exp.value, { timeout });
    case 'matches_text': return e.toHaveText(new RegExp(exp.value), { timeout });
    case 'count': return e.toHaveCount(exp.value, { timeout });
  }
  throw new BridgeError('protocol', 'unknown expectation ' + exp.kind);
}

async function newPage(browser, msg) {
  const context = await browser.newContext({ viewport: msg.viewport });
  const page = await context.newPage();
  page.setDefaultTimeout(msg.timeout_ms);
  page.setDefaultNavigationTimeout(msg.navigation_timeout_ms);
  const id = nextPage++;
  const entry = { context, page, policy: { action: 'unset' }, pendingError: null };
  page.on('dialog', async dialog => {
    const policy = entry.policy;
    if (policy.action === 'unset') {
      entry.pendingError = { kind: 'unhandled_dialog', message: dialog.type() };
      await dialog.dismiss().catch(() => {});
    } else if (policy.expect && dialog.type() !== policy.expect) {
      entry.pendingError = { kind: 'assertion', message: `expected ${policy.expect} dialog, got ${dialog.type()}` };
      await dialog.dismiss().catch(() => {});
    } else if (policy.action === 'accept') {
      await dialog.accept().catch(() => {});
    } else {
      await dialog.dismiss().catch(() => {});
    }
  });
  pages.set(id, entry);
  return { page: id };
}

async function handle(browser, msg) {
  if (msg.op === 'new_page') return newPage(browser, msg);
  const entry = pages.get(msg.page);
  if (!entry) throw new BridgeError('protocol', 'unknown page ' + msg.page);
  const page = entry.page;
  switch (msg.op) {
    case 'goto': await page.goto(msg.url); return null;
    case 'reload': await page.reload(); return null;
    case 'click': await resolve(page, msg.locator).click({ timeout: msg.timeout_ms }); return null;
    case 'fill': await resolve(page, msg.locator).fill(msg.value, { timeout: msg.timeout_ms }); return null;
    case 'is_visible': return resolve(page, msg.locator).isVisible();
    case 'count': return resolve(page, msg.locator).count();
    case 'inner_texts': return resolve(page, msg.locator).allInnerTexts();
    case 'wait_for':
      await resolve(page, msg.locator).waitFor({ state: msg.state, timeout: msg.timeout_ms });
      return null;
    case 'expect':
      await assertExpectation(resolve(page, msg.locator), msg.expectation, msg.timeout_ms);
      return null;
    case 'click_and_wait_for_response': {
      const m = msg.matcher;
      const waiting = page.waitForResponse(
        r => r.url().includes(m.url_contains) && r.request().method() === m.method,
        { timeout: msg.timeout_ms }
      );
      waiting.catch(() => {});
      await resolve(page, msg.locator).click({ timeout: msg.timeout_ms });
      const response = await waiting;
      const text = await response.text();
      if (!response.ok()) {
        throw new BridgeError('playwright', `${m.method} ${response.url()} returned ${response.status()}: ${text}`);
      }
      try { return JSON.parse(text); } catch (_) { return text; }
    }
    case 'set_dialog_policy': entry.policy = msg.policy; return null;
    case 'close_page':
      pages.delete(msg.page);
      await entry.context.close();
      return null;
  }
  throw new BridgeError('protocol', 'unknown op ' + msg.op);
}

(async () => {
  const browser = await browserType.launch(launchOptions);
  reply({ id: 0, ok: true, value: 'ready' });
  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let msg;
    try {
      msg = JSON.parse(line);
    } catch (err) {
      console.error('unparseable request: ' + line);
      continue;
    }
    if (msg.op === 'shutdown') {
      await browser.close().catch(() => {});
      reply({ id: msg.id, ok: true, value: null });
      break;
    }
    handle(browser, msg).then(
      value => {
        const entry = pages.get(msg.page);
        const pending = entry && entry.pendingError;
        if (pending) {
          entry.pendingError = null;
          reply({ id: msg.id, ok: false, error: pending });
        } else {
          reply({ id: msg.id, ok: true, value: value === undefined ? null : value });
        }
      },
      err => reply({ id: msg.id, ok: false, error: classify(err) })
    );
  }
  process.exit(0);
})().catch(err => {
  console.error((err && err.stack) || err);
  process.exit(1);
});
"#;
