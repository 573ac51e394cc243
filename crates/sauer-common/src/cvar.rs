// cvar.rs — dynamic variable tracking
// Converted from: myq2-original/qcommon/cvar.c (see myq2_common::cvar for the
// full client+server ancestor). Client-only concerns (CVAR_USERINFO,
// snd_restart/vid_restart auto-triggers, FS_SetGamedir plumbing) are
// dropped; SERVERINFO/ARCHIVE/LATCH/NOSET survive because spec.md §6's
// server-info ping and §6's `config.cfg` persistence both need them.

use crate::common::com_printf;
use crate::wildcards::wildcardfit;

use std::collections::HashMap;

pub const CVAR_ARCHIVE: i32 = 1 << 0; // saved to config.cfg
pub const CVAR_SERVERINFO: i32 = 1 << 1; // exported in the serverinfo ping string
pub const CVAR_NOSET: i32 = 1 << 2; // can not be changed from console at all
pub const CVAR_LATCH: i32 = 1 << 3; // changes don't take effect until next map

const MAX_INFO_STRING: usize = 512;

/// Append `\key\value` to an info string (mirrors Quake2's Info_SetValueForKey,
/// used here to build the serverinfo ping payload from §6).
fn info_set_value_for_key(info: &mut String, key: &str, value: &str) {
    if key.contains('\\') || value.contains('\\') {
        return;
    }
    info.push('\\');
    info.push_str(key);
    info.push('\\');
    info.push_str(value);
}

/// A console variable.
#[derive(Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub latched_string: Option<String>,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

/// The full cvar system context.
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self {
            cvar_vars: Vec::new(),
            cvar_index: HashMap::new(),
        }
    }

    /// Validate that a string doesn't contain characters invalid in info strings.
    pub fn info_validate(s: &str) -> bool {
        !s.contains('\\') && !s.contains('"') && !s.contains(';')
    }

    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(name).copied()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    pub fn find_var_mut(&mut self, name: &str) -> Option<&mut Cvar> {
        if let Some(&idx) = self.cvar_index.get(name) {
            Some(&mut self.cvar_vars[idx])
        } else {
            None
        }
    }

    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| &var.string)
    }

    pub fn variable_bool(&self, name: &str) -> bool {
        self.variable_value(name) != 0.0
    }

    pub fn complete_variable(&self, partial: &str) -> Option<&str> {
        if partial.is_empty() {
            return None;
        }
        for var in &self.cvar_vars {
            if var.name == partial {
                return Some(&var.name);
            }
        }
        for var in &self.cvar_vars {
            if var.name.starts_with(partial) {
                return Some(&var.name);
            }
        }
        None
    }

    pub fn complete_all_variables(&self, partial: &str) -> Vec<&str> {
        self.cvar_vars
            .iter()
            .filter(|v| v.name.starts_with(partial))
            .map(|v| v.name.as_str())
            .collect()
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, value: Option<&str>, flags: i32) -> Option<usize> {
        if flags & CVAR_SERVERINFO != 0 && !Self::info_validate(name) {
            com_printf("invalid info cvar name\n");
            return None;
        }

        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return Some(idx);
        }

        let value = value?;
        if flags & CVAR_SERVERINFO != 0 && !Self::info_validate(value) {
            com_printf("invalid info cvar value\n");
            return None;
        }

        let float_val = value.parse::<f32>().unwrap_or(0.0);
        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            latched_string: None,
            flags,
            modified: true,
            value: float_val,
        });
        self.cvar_index.insert(name.to_string(), idx);
        Some(idx)
    }

    pub fn get_or_create(&mut self, name: &str, value: &str, flags: i32) -> usize {
        self.get(name, Some(value), flags).expect("failed to create cvar")
    }

    fn set2(&mut self, name: &str, value: &str, force: bool, server_running: bool) -> Option<usize> {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, Some(value), 0),
        };

        if self.cvar_vars[idx].flags & CVAR_SERVERINFO != 0 && !Self::info_validate(value) {
            com_printf("invalid info cvar value\n");
            return Some(idx);
        }

        if !force {
            if self.cvar_vars[idx].flags & CVAR_NOSET != 0 {
                com_printf(&format!("{} is write protected.\n", name));
                return Some(idx);
            }

            if self.cvar_vars[idx].flags & CVAR_LATCH != 0 {
                let unchanged = match &self.cvar_vars[idx].latched_string {
                    Some(latched) => value == latched,
                    None => value == self.cvar_vars[idx].string,
                };
                if unchanged {
                    return Some(idx);
                }
                if server_running {
                    com_printf(&format!("{} will be changed for next map.\n", name));
                    self.cvar_vars[idx].latched_string = Some(value.to_string());
                } else {
                    self.cvar_vars[idx].string = value.to_string();
                    self.cvar_vars[idx].value = value.parse::<f32>().unwrap_or(0.0);
                }
                return Some(idx);
            }
        } else {
            self.cvar_vars[idx].latched_string = None;
        }

        if value == self.cvar_vars[idx].string {
            return Some(idx);
        }

        self.cvar_vars[idx].modified = true;
        self.cvar_vars[idx].string = value.to_string();
        self.cvar_vars[idx].value = value.parse::<f32>().unwrap_or(0.0);
        Some(idx)
    }

    pub fn set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, false, false)
    }

    pub fn set_with_server_running(&mut self, name: &str, value: &str, server_running: bool) -> Option<usize> {
        self.set2(name, value, false, server_running)
    }

    pub fn force_set(&mut self, name: &str, value: &str) -> Option<usize> {
        self.set2(name, value, true, false)
    }

    pub fn set_value(&mut self, name: &str, value: f32) {
        let val_str = if value == (value as i32) as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &val_str);
    }

    /// Apply all latched variable changes (called on map change).
    pub fn get_latched_vars(&mut self) {
        for var in &mut self.cvar_vars {
            if let Some(latched) = var.latched_string.take() {
                var.string = latched;
                var.value = var.string.parse::<f32>().unwrap_or(0.0);
            }
        }
    }

    /// Handle variable inspection/changing from the console.
    pub fn command(&mut self, argv0: &str, argc: usize, argv1: Option<&str>) -> bool {
        let idx = match self.find_var_index(argv0) {
            Some(idx) => idx,
            None => return false,
        };

        if argc == 1 {
            com_printf(&format!("\"{}\" is \"{}\"\n", self.cvar_vars[idx].name, self.cvar_vars[idx].string));
            return true;
        }

        if let Some(value) = argv1 {
            let name = self.cvar_vars[idx].name.clone();
            self.set(&name, value);
        }
        true
    }

    /// Write all archived cvars to a writer (the `config.cfg` persistence
    /// from spec.md §6).
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in &self.cvar_vars {
            if var.flags & CVAR_ARCHIVE != 0 {
                writeln!(writer, "set {} \"{}\"", var.name, var.string)?;
            }
        }
        Ok(())
    }

    /// Build an info string from all cvars with the given flag bit set.
    pub fn bit_info(&self, bit: i32) -> String {
        let mut info = String::with_capacity(MAX_INFO_STRING);
        for var in &self.cvar_vars {
            if var.flags & bit != 0 {
                info_set_value_for_key(&mut info, &var.name, &var.string);
            }
        }
        info
    }

    pub fn serverinfo(&self) -> String {
        self.bit_info(CVAR_SERVERINFO)
    }

    pub fn set_f(&mut self, argc: usize, argv: &[&str]) {
        if argc != 2 {
            com_printf("usage: set <variable> <value>\n");
            return;
        }
        self.set(argv[0], argv[1]);
    }

    pub fn list_f(&self, argc: usize, argv: &[&str]) {
        let pattern = if argc == 1 { Some(argv[0]) } else { None };
        self.list(pattern);
    }

    pub fn list(&self, pattern: Option<&str>) -> (usize, usize) {
        let wc = pattern.unwrap_or("*");
        let mut total = 0;
        let mut matching = 0;

        for var in &self.cvar_vars {
            total += 1;
            if wildcardfit(wc, &var.name) {
                matching += 1;
                let archive = if var.flags & CVAR_ARCHIVE != 0 { '*' } else { ' ' };
                let serverinfo = if var.flags & CVAR_SERVERINFO != 0 { 'S' } else { ' ' };
                let noset = if var.flags & CVAR_NOSET != 0 {
                    '-'
                } else if var.flags & CVAR_LATCH != 0 {
                    'L'
                } else {
                    ' '
                };
                com_printf(&format!("{}{}{} {} \"{}\"\n", archive, serverinfo, noset, var.name, var.string));
            }
        }

        com_printf(&format!("{} cvars, {} matching\n", total, matching));
        (total, matching)
    }
}

impl Default for CvarContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_find() {
        let mut ctx = CvarContext::new();
        ctx.get("maxspam", Some("3"), 0);
        assert_eq!(ctx.variable_value("maxspam"), 3.0);
        assert_eq!(ctx.variable_string("maxspam"), "3");
    }

    #[test]
    fn set_changes_value() {
        let mut ctx = CvarContext::new();
        ctx.get("spammillis", Some("1000"), 0);
        ctx.set("spammillis", "2000");
        assert_eq!(ctx.variable_value("spammillis"), 2000.0);
    }

    #[test]
    fn noset_blocks_change() {
        let mut ctx = CvarContext::new();
        ctx.get("adminpass", Some("secret"), CVAR_NOSET);
        ctx.set("adminpass", "other");
        assert_eq!(ctx.variable_string("adminpass"), "secret");
    }

    #[test]
    fn force_set_overrides_noset() {
        let mut ctx = CvarContext::new();
        ctx.get("adminpass", Some("secret"), CVAR_NOSET);
        ctx.force_set("adminpass", "other");
        assert_eq!(ctx.variable_string("adminpass"), "other");
    }

    #[test]
    fn latch_defers_until_applied() {
        let mut ctx = CvarContext::new();
        ctx.get("gamemode", Some("ffa"), CVAR_LATCH);
        ctx.set_with_server_running("gamemode", "ctf", true);
        assert_eq!(ctx.variable_string("gamemode"), "ffa");
        ctx.get_latched_vars();
        assert_eq!(ctx.variable_string("gamemode"), "ctf");
    }

    #[test]
    fn write_variables_only_archived() {
        let mut ctx = CvarContext::new();
        ctx.get("archived_var", Some("hello"), CVAR_ARCHIVE);
        ctx.get("normal_var", Some("world"), 0);
        let mut buf = Vec::new();
        ctx.write_variables(&mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("set archived_var \"hello\""));
        assert!(!output.contains("normal_var"));
    }

    #[test]
    fn serverinfo_builds_info_string() {
        let mut ctx = CvarContext::new();
        ctx.get("mode", Some("ctf"), CVAR_SERVERINFO);
        assert_eq!(ctx.serverinfo(), "\\mode\\ctf");
    }
}
