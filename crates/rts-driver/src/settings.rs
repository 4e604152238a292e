//! 配置加载
//!
//! 读取 JSON 配置文档（`settings.json`）：
//!
//! ```json
//! {
//!   "counters_path": "./counters",
//!   "shutters": { "figuier": { "id": "0x123456" } },
//!   "Recipes": { "night_down": [ { "shutter": "figuier", "command": "down" } ] },
//!   "UART": { "VID_SR": "2341:0043", "SPEED": 115200 },
//!   "Test": { "remote_mocking": false }
//! }
//! ```
//!
//! 未识别的字段（如 HTTP 端口）由外部组件使用，这里忽略。

use crate::error::SettingsError;
use rts_link::SerialConfig;
use rts_protocol::parse_device_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// 遥控设备（卷帘）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// 配置中的名称
    pub name: String,
    /// 24-bit 设备地址
    pub id: u32,
    /// 计数器文件名（不含扩展名），保留配置中的原始文本
    pub key: String,
}

impl Device {
    /// 以规范十六进制文本作为计数器文件名
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self {
            name: name.into(),
            id,
            key: format!("{:06X}", id),
        }
    }

    /// 从配置中的十六进制文本构造
    pub fn from_id_text(name: impl Into<String>, id_text: &str) -> Result<Self, SettingsError> {
        let name = name.into();
        let id = parse_device_id(id_text).map_err(|_| SettingsError::InvalidShutterId {
            name: name.clone(),
            id: id_text.to_string(),
        })?;
        Ok(Self {
            name,
            id,
            key: id_text.trim().to_string(),
        })
    }
}

/// 配方步骤
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub shutter: String,
    pub command: String,
}

impl RecipeStep {
    pub fn new(shutter: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            shutter: shutter.into(),
            command: command.into(),
        }
    }
}

/// 串口配置段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UartSettings {
    /// VID:PID 子串
    #[serde(rename = "VID_SR")]
    pub vid_pid: String,
    /// 波特率
    #[serde(rename = "SPEED", default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    115_200
}

impl UartSettings {
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(self.vid_pid.clone(), self.baud_rate)
    }
}

/// 测试配置段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSettings {
    /// 使用模拟链路代替真实串口
    #[serde(default)]
    pub remote_mocking: bool,
}

#[derive(Debug, Deserialize)]
struct ShutterEntry {
    id: String,
}

/// 配置文档的原始结构
#[derive(Debug, Deserialize)]
struct SettingsDocument {
    counters_path: PathBuf,
    #[serde(default)]
    shutters: BTreeMap<String, ShutterEntry>,
    #[serde(rename = "Recipes", default)]
    recipes: BTreeMap<String, Vec<RecipeStep>>,
    #[serde(rename = "UART", default)]
    uart: Option<UartSettings>,
    #[serde(rename = "Test", default)]
    test: TestSettings,
}

/// 已解析的配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// 计数器目录（已解析为相对配置文件的路径）
    pub counters_path: PathBuf,
    /// 名称 → 设备
    pub shutters: BTreeMap<String, Device>,
    /// 配方名 → 有序步骤
    pub recipes: BTreeMap<String, Vec<RecipeStep>>,
    pub uart: Option<UartSettings>,
    pub test: TestSettings,
}

impl Settings {
    /// 创建空配置
    pub fn new(counters_path: impl Into<PathBuf>) -> Self {
        Self {
            counters_path: counters_path.into(),
            shutters: BTreeMap::new(),
            recipes: BTreeMap::new(),
            uart: None,
            test: TestSettings::default(),
        }
    }

    /// 添加设备
    pub fn with_shutter(mut self, device: Device) -> Self {
        self.shutters.insert(device.name.clone(), device);
        self
    }

    /// 添加配方
    pub fn with_recipe(mut self, name: impl Into<String>, steps: Vec<RecipeStep>) -> Self {
        self.recipes.insert(name.into(), steps);
        self
    }

    /// 设置串口参数
    pub fn with_uart(mut self, vid_pid: impl Into<String>, baud_rate: u32) -> Self {
        self.uart = Some(UartSettings {
            vid_pid: vid_pid.into(),
            baud_rate,
        });
        self
    }

    /// 从文件加载，`counters_path` 相对路径基于配置文件所在目录
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_json_str(&content, base_dir)
    }

    /// 从 JSON 文本解析
    pub fn from_json_str(content: &str, base_dir: &Path) -> Result<Self, SettingsError> {
        let document: SettingsDocument = serde_json::from_str(content)?;

        let shutters = document
            .shutters
            .into_iter()
            .map(|(name, entry)| Device::from_id_text(name.clone(), &entry.id).map(|d| (name, d)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        for (recipe, steps) in &document.recipes {
            if let Some(step) = steps.iter().find(|step| !shutters.contains_key(&step.shutter)) {
                return Err(SettingsError::UnknownRecipeShutter {
                    recipe: recipe.clone(),
                    shutter: step.shutter.clone(),
                });
            }
        }

        Ok(Self {
            counters_path: resolve_counters_path(&document.counters_path, base_dir),
            shutters,
            recipes: document.recipes,
            uart: document.uart,
            test: document.test,
        })
    }

    /// 按名称查找设备
    pub fn device(&self, name: &str) -> Option<&Device> {
        self.shutters.get(name)
    }

    /// 按名称查找配方
    pub fn recipe(&self, name: &str) -> Option<&[RecipeStep]> {
        self.recipes.get(name).map(Vec::as_slice)
    }
}

/// 相对路径去掉 `./` 后拼接到配置目录
fn resolve_counters_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let relative: PathBuf = path
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    base_dir.join(relative)
}
