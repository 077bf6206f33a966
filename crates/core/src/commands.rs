use crate::aggregate::ALL_DATASOURCES_KEY;
use crate::tabs::TopTab;

const DATASOURCE_KEYS: [char; 9] = ['1', '2', '3', '4', '5', '6', '7', '8', '9'];
const AGGREGATE_KEY: char = '0';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    SelectTopTab(TopTab),
    ReloadActiveTab,
    ToggleAutoReload,
    SelectDatasource(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub key: char,
    pub command: Command,
    pub description: String,
}

impl KeyBinding {
    fn new(key: char, command: Command, description: impl Into<String>) -> Self {
        Self {
            key,
            command,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTable {
    bindings: Vec<KeyBinding>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self {
            bindings: vec![
                KeyBinding::new(
                    'q',
                    Command::SelectTopTab(TopTab::History),
                    "Select Query History Tab.",
                ),
                KeyBinding::new(
                    'w',
                    Command::SelectTopTab(TopTab::Running),
                    "Select Running Queries Tab.",
                ),
                KeyBinding::new(
                    'e',
                    Command::SelectTopTab(TopTab::Setting),
                    "Select Settings Tab.",
                ),
                KeyBinding::new('r', Command::ReloadActiveTab, "Reload."),
                KeyBinding::new('t', Command::ToggleAutoReload, "Toggle Auto Reload."),
            ],
        }
    }
}

impl CommandTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_datasources<'a>(datasources: impl IntoIterator<Item = &'a str>) -> Self {
        let mut table = Self::default();
        let names = datasources
            .into_iter()
            .filter(|name| *name != ALL_DATASOURCES_KEY);
        for (key, name) in DATASOURCE_KEYS.iter().zip(names) {
            table.bindings.push(KeyBinding::new(
                *key,
                Command::SelectDatasource(name.to_string()),
                format!("Select {name} Tab."),
            ));
        }
        table.bindings.push(KeyBinding::new(
            AGGREGATE_KEY,
            Command::SelectDatasource(ALL_DATASOURCES_KEY.to_string()),
            format!("Select {ALL_DATASOURCES_KEY} Tab."),
        ));
        table
    }

    #[must_use]
    pub fn resolve(&self, key: char) -> Option<&Command> {
        self.bindings
            .iter()
            .find(|binding| binding.key == key)
            .map(|binding| &binding.command)
    }

    #[must_use]
    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    #[must_use]
    pub fn key_for(&self, command: &Command) -> Option<char> {
        self.bindings
            .iter()
            .find(|binding| &binding.command == command)
            .map(|binding| binding.key)
    }
}
