use crate::locality::Localities;
use crate::settings::LabelSettings;

pub struct AppState {
    pub localities: Localities,
    pub settings: LabelSettings,
}
