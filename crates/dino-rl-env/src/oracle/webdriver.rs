//! Browser-backed oracle speaking the W3C WebDriver protocol

use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::driver::{self, DriverProcess};
use super::{DinoGame, Key, NO_OBSTACLE_X, NO_OBSTACLE_Y};
use crate::config::DriverConfig;
use crate::error::{DinoError, Result};

/// W3C key under which element references are returned
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Length of the `data:image/png;base64,` prefix of `toDataURL()`
const DATA_URL_HEADER_LEN: usize = 22;

impl Key {
    /// Code point WebDriver uses for this key
    #[must_use]
    pub fn webdriver_code(self) -> char {
        match self {
            Self::Space => '\u{E00D}',
            Self::Up => '\u{E013}',
            Self::Down => '\u{E015}',
        }
    }
}

/// The game running in a Chrome session controlled through `chromedriver`
pub struct WebDriverGame {
    client: reqwest::Client,
    endpoint: String,
    session_id: String,
    driver: Option<DriverProcess>,
    closed: bool,
}

impl WebDriverGame {
    /// Fetch/spawn the driver, open a browser and load the game
    pub async fn launch(config: &DriverConfig) -> Result<Self> {
        config.validate()?;
        driver::ensure_binary(config).await?;
        let process = DriverProcess::spawn(config).await?;

        let mut game = Self::connect(&config.endpoint(), &config.chrome_args()).await?;
        game.driver = Some(process);
        game.prepare(&config.url, config.autoscale).await?;

        info!(url = %config.url, session = %game.session_id, headless = config.headless, "game loaded");
        Ok(game)
    }

    /// Open a new session on an already running driver
    pub async fn connect(endpoint: &str, chrome_args: &[String]) -> Result<Self> {
        let client = reqwest::Client::new();
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": chrome_args },
                }
            }
        });

        let response = client
            .post(format!("{endpoint}/session"))
            .json(&capabilities)
            .send()
            .await?;
        let value = unwrap_value(response).await?;
        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| DinoError::UnexpectedValue {
                script: "POST /session".into(),
                value: value.clone(),
            })?
            .to_string();
        debug!(%session_id, "webdriver session created");

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            session_id,
            driver: None,
            closed: false,
        })
    }

    /// Session identifier assigned by the driver
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Load `url` in the current tab
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    /// Load the game page; navigation interruptions are logged and ignored
    pub async fn open_page(&self, url: &str) -> Result<()> {
        match self.navigate(url).await {
            Err(err) if err.is_navigation_interruption() => {
                warn!(%url, error = %err, "navigation reported an error, continuing");
                Ok(())
            }
            other => other,
        }
    }

    /// Open the page and patch the runner, closing the session on failure
    pub(crate) async fn prepare(&mut self, url: &str, autoscale: bool) -> Result<()> {
        let prepared: Result<()> = async {
            self.open_page(url).await?;
            if !autoscale {
                self.execute("Runner.instance_.setArcadeModeContainerScale = function(){};").await?;
            }
            Ok(())
        }
        .await;

        if let Err(err) = prepared {
            if let Err(close_err) = self.close().await {
                warn!(error = %close_err, "failed to close session after setup error");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Run a script and return its JSON result
    pub async fn execute(&self, script: &str) -> Result<Value> {
        self.command(Method::POST, "/execute/sync", Some(json!({ "script": script, "args": [] })))
            .await
    }

    async fn execute_bool(&self, script: &str) -> Result<bool> {
        let value = self.execute(script).await?;
        value.as_bool().ok_or_else(|| unexpected(script, value))
    }

    async fn execute_f64(&self, script: &str) -> Result<f64> {
        let value = self.execute(script).await?;
        value.as_f64().ok_or_else(|| unexpected(script, value))
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        unwrap_value(request.send().await?).await
    }

    async fn body_element(&self) -> Result<String> {
        let value = self
            .command(Method::POST, "/element", Some(json!({ "using": "tag name", "value": "body" })))
            .await?;
        value[ELEMENT_KEY]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| unexpected("find body", value))
    }
}

fn unexpected(script: &str, value: Value) -> DinoError {
    DinoError::UnexpectedValue { script: script.to_string(), value }
}

/// Strip the `{"value": ...}` envelope, turning W3C error objects into [`DinoError::WebDriver`]
async fn unwrap_value(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let mut body: Value = response.json().await?;
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        Ok(value)
    } else {
        Err(DinoError::WebDriver {
            error: value["error"].as_str().unwrap_or("unknown error").to_string(),
            message: value["message"].as_str().unwrap_or(status.as_str()).to_string(),
        })
    }
}

/// Concatenate the distance-meter digit glyphs into a number
pub(crate) fn parse_digits(value: &Value) -> Option<u64> {
    let digits = value.as_array()?;
    if digits.is_empty() {
        return Some(0);
    }
    let text: String = digits
        .iter()
        .map(|d| match d {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect::<Option<String>>()?;
    text.parse().ok()
}

/// Parameter names end up inside a script, so only dotted identifiers pass
fn check_parameter_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.split('.').all(|part| {
            !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(DinoError::Config(format!("invalid parameter name '{key}'")))
    }
}

fn obstacle_script(n: usize, field: &str, fallback: f64) -> String {
    format!(
        "return Runner.instance_.horizon.obstacles.length >= {n} ? \
         Runner.instance_.horizon.obstacles[{index}].{field} : {fallback};",
        index = n.saturating_sub(1),
    )
}

#[async_trait]
impl DinoGame for WebDriverGame {
    async fn restart(&self) -> Result<()> {
        self.execute("Runner.instance_.restart();").await?;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.execute("Runner.instance_.stop();").await?;
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.execute("Runner.instance_.play();").await?;
        Ok(())
    }

    async fn is_crashed(&self) -> Result<bool> {
        self.execute_bool("return Runner.instance_.crashed;").await
    }

    async fn is_paused(&self) -> Result<bool> {
        self.execute_bool("return Runner.instance_.paused;").await
    }

    async fn is_playing(&self) -> Result<bool> {
        self.execute_bool("return Runner.instance_.playing;").await
    }

    async fn is_inverted(&self) -> Result<bool> {
        self.execute_bool("return Runner.instance_.inverted;").await
    }

    async fn press(&self, key: Key) -> Result<()> {
        debug!(%key, "key press");
        let element = self.body_element().await?;
        self.command(
            Method::POST,
            &format!("/element/{element}/value"),
            Some(json!({ "text": key.webdriver_code().to_string() })),
        )
        .await?;
        Ok(())
    }

    async fn score(&self) -> Result<u64> {
        let script = "return Runner.instance_.distanceMeter.digits;";
        let value = self.execute(script).await?;
        parse_digits(&value).ok_or_else(|| unexpected(script, value))
    }

    async fn dino_x(&self) -> Result<f64> {
        self.execute_f64("return Runner.instance_.tRex.xPos;").await
    }

    async fn dino_y(&self) -> Result<f64> {
        self.execute_f64("return Runner.instance_.tRex.yPos;").await
    }

    async fn obstacle_width(&self, n: usize) -> Result<f64> {
        self.execute_f64(&obstacle_script(n, "typeConfig.width", 0.0)).await
    }

    async fn obstacle_height(&self, n: usize) -> Result<f64> {
        self.execute_f64(&obstacle_script(n, "typeConfig.height", 0.0)).await
    }

    async fn obstacle_x(&self, n: usize) -> Result<f64> {
        self.execute_f64(&obstacle_script(n, "xPos", NO_OBSTACLE_X)).await
    }

    async fn obstacle_y(&self, n: usize) -> Result<f64> {
        self.execute_f64(&obstacle_script(n, "yPos", NO_OBSTACLE_Y)).await
    }

    async fn speed(&self) -> Result<f64> {
        self.execute_f64("return Runner.instance_.currentSpeed;").await
    }

    async fn canvas_png(&self) -> Result<Vec<u8>> {
        let script = format!(
            "return document.getElementsByClassName(\"runner-canvas\")[0].toDataURL().substring({DATA_URL_HEADER_LEN});"
        );
        let value = self.execute(&script).await?;
        let encoded = value.as_str().ok_or_else(|| unexpected(&script, value.clone()))?;
        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }

    async fn parameter(&self, key: &str) -> Result<f64> {
        check_parameter_key(key)?;
        self.execute_f64(&format!("return Runner.{key};")).await
    }

    async fn set_parameter(&self, key: &str, value: f64) -> Result<()> {
        check_parameter_key(key)?;
        if !value.is_finite() {
            return Err(DinoError::Config(format!("parameter {key} must be finite, got {value}")));
        }
        debug!(%key, %value, "set parameter");
        self.execute(&format!("Runner.{key} = {value};")).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let ended = self.command(Method::DELETE, "", None).await;
        if let Some(mut process) = self.driver.take() {
            process.kill().await?;
        }
        info!(session = %self.session_id, "browser closed");
        ended.map(|_| ())
    }
}
