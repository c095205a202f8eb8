//! The non-volatile key/value store backing a modem instance.
//!
//! A plain `key = value` text file per `(base_port, instance_id)`. Reads
//! write their effective value back into the tree so a fresh file ends up
//! fully populated with defaults; mutations flush to disk immediately.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::Write;
use std::path::PathBuf;

pub(crate) const NV_OPER_NAME_INDEX: &str = "oper_name_index";
pub(crate) const NV_OPER_INDEX: &str = "oper_index";
pub(crate) const NV_SELECTION_MODE: &str = "selection_mode";
pub(crate) const NV_OPER_COUNT: &str = "oper_count";
pub(crate) const NV_MODEM_TECHNOLOGY: &str = "modem_technology";
pub(crate) const NV_PREFERRED_MODE: &str = "preferred_mode";
pub(crate) const NV_CDMA_SUBSCRIPTION_SOURCE: &str = "cdma_subscription_source";
pub(crate) const NV_CDMA_ROAMING_PREF: &str = "cdma_roaming_pref";
pub(crate) const NV_IN_ECBM: &str = "in_ecbm";
pub(crate) const NV_EMERGENCY_NUMBER_FMT: &str = "emergency_number_";
pub(crate) const NV_PRL_VERSION: &str = "prl_version";
pub(crate) const NV_MODEM_SMSC_ADDRESS: &str = "smsc_address";

#[derive(Debug)]
pub(crate) struct Nvram {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl Nvram {
    pub(crate) fn load(path: PathBuf) -> Nvram {
        debug!("using config file: {}", path.display());
        let mut nvram = Nvram {
            path,
            values: BTreeMap::new(),
        };
        match fs::read_to_string(&nvram.path) {
            Ok(text) => {
                for line in text.lines() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    let mut parts = line.splitn(2, '=');
                    if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                        nvram
                            .values
                            .insert(key.trim().to_owned(), value.trim().to_owned());
                    }
                }
            }
            Err(_) => {
                debug!("unable to load config, seeding {}", nvram.path.display());
                nvram
                    .values
                    .insert(NV_MODEM_TECHNOLOGY.to_owned(), "gsm".to_owned());
                nvram.save();
            }
        }
        nvram
    }

    pub(crate) fn save(&self) {
        if let Err(e) = self.try_save() {
            error!("could not save config file {}: {}", self.path.display(), e);
        }
    }

    fn try_save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&self.path)?;
        for (key, value) in &self.values {
            writeln!(file, "{} = {}", key, value)?;
        }
        Ok(())
    }

    /// Reads an integer, installing (but not flushing) the effective value.
    pub(crate) fn get_int(&mut self, name: &str, defval: i32) -> i32 {
        let value = self
            .values
            .get(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(defval);
        debug!("setting value of {} to {}", name, value);
        self.values.insert(name.to_owned(), value.to_string());
        value
    }

    /// Reads a string, installing the default when one is given.
    pub(crate) fn get_str(&mut self, name: &str, defval: Option<&str>) -> Option<String> {
        let value = match self.values.get(name) {
            Some(v) => Some(v.clone()),
            None => defval.map(|d| d.to_owned()),
        };
        if let Some(ref v) = value {
            debug!("setting value of {} to {}", name, v);
            self.values.insert(name.to_owned(), v.clone());
        }
        value
    }

    /// Mutation: flush-on-write.
    pub(crate) fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_owned(), value.to_owned());
        self.save();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    fn temp_path() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        ::std::env::temp_dir().join(format!(
            "modem-emu-nvram-test-{}-{}",
            ::std::process::id(),
            n
        ))
    }

    #[test]
    fn round_trip() {
        let path = temp_path();
        {
            let mut nv = Nvram::load(path.clone());
            nv.set("oper_index", "1");
            nv.set("smsc_address", "+123456789");
        }
        let mut nv = Nvram::load(path.clone());
        assert_eq!(nv.get_int("oper_index", 0), 1);
        assert_eq!(
            nv.get_str("smsc_address", None),
            Some("+123456789".to_owned())
        );
        let _ = fs::remove_file(path);
    }

    #[test]
    fn defaults_written_back() {
        let path = temp_path();
        {
            let mut nv = Nvram::load(path.clone());
            assert_eq!(nv.get_int("prl_version", 7), 7);
            assert_eq!(nv.get_str("missing", None), None);
            nv.save();
        }
        let mut nv = Nvram::load(path.clone());
        assert_eq!(nv.get_int("prl_version", 0), 7);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn seeds_technology_on_fresh_file() {
        let path = temp_path();
        let mut nv = Nvram::load(path.clone());
        assert_eq!(nv.get_str("modem_technology", None), Some("gsm".to_owned()));
        let _ = fs::remove_file(path);
    }
}
