// common.rs — misc functions used across the server binary
// Converted from: myq2-original/qcommon/common.c's Com_Printf/Com_DPrintf/
// Com_Error triad (see myq2_common::common in the teacher for the ancestor
// of this file — this version drops everything that was specific to
// rendering/physics/file-format code, which the teacher intermixed with
// these genuinely-generic print/error helpers).

use std::sync::Mutex;

pub const MAXPRINTMSG: usize = 4096;

/// Fatal: log and exit non-zero (spec.md §7 tier 3).
pub const ERR_FATAL: i32 = 1;
/// Drop: log, recover, stay up (spec.md §7 tier 2 is handled by the caller
/// choosing to disconnect a single peer instead of calling com_error at all;
/// ERR_DROP exists for genuinely server-wide non-fatal errors).
pub const ERR_DROP: i32 = 2;

static RD_BUFFER: Mutex<Option<String>> = Mutex::new(None);
static DEVELOPER: Mutex<bool> = Mutex::new(false);

/// Begin redirecting printf output into a buffer (used by the rcon/HTTP
/// status endpoint to capture command output instead of printing to stdout).
pub fn com_begin_redirect() {
    let mut buf = RD_BUFFER.lock().unwrap();
    *buf = Some(String::new());
}

/// End redirect and return the captured output.
pub fn com_end_redirect() -> Option<String> {
    let mut buf = RD_BUFFER.lock().unwrap();
    buf.take()
}

/// Enable/disable `com_dprintf` output (mirrors the teacher's `developer` cvar).
pub fn com_set_developer(on: bool) {
    *DEVELOPER.lock().unwrap() = on;
}

/// General-purpose print function. Prints to stdout and appends to the
/// redirect buffer if one is active.
pub fn com_printf(msg: &str) {
    {
        let mut buf = RD_BUFFER.lock().unwrap();
        if let Some(ref mut s) = *buf {
            s.push_str(msg);
            return;
        }
    }
    print!("{msg}");
}

/// Developer-only print. Only prints when developer mode is active.
pub fn com_dprintf(msg: &str) {
    if !*DEVELOPER.lock().unwrap() {
        return;
    }
    com_printf(msg);
}

/// Engine error handler.
/// - `ERR_FATAL`: prints to stderr and exits the process non-zero (spec.md
///   §7 tier 3: listen-socket/transport init failure at startup).
/// - anything else (`ERR_DROP`): prints a boxed error banner, non-fatal.
pub fn com_error(code: i32, msg: &str) {
    if code == ERR_FATAL {
        eprintln!("FATAL: {msg}");
        std::process::exit(1);
    } else {
        eprintln!("********************\nERROR: {msg}\n********************");
    }
}

const MAX_NUM_ARGVS: usize = 50;

/// Parsed command-line arguments, reusable for both the `+set`/`+map` style
/// early/late command parsing in `cmd.rs` and `sauer-cli`'s own flag parsing.
#[derive(Default)]
pub struct ComArgs {
    pub argc: usize,
    pub argv: Vec<String>,
}

impl ComArgs {
    pub fn new() -> Self {
        Self { argc: 0, argv: Vec::new() }
    }

    pub fn init(&mut self, args: &[String]) {
        self.argc = args.len().min(MAX_NUM_ARGVS);
        self.argv = args[..self.argc].to_vec();
    }

    pub fn com_argc(&self) -> usize {
        self.argc
    }

    pub fn com_argv(&self, arg: usize) -> &str {
        if arg >= self.argc { "" } else { &self.argv[arg] }
    }

    pub fn com_clear_argv(&mut self, arg: usize) {
        if arg < self.argc {
            self.argv[arg] = String::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_captures_printf() {
        com_begin_redirect();
        com_printf("hello ");
        com_printf("world");
        assert_eq!(com_end_redirect().as_deref(), Some("hello world"));
    }
}
