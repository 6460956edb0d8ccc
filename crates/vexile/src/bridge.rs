//! Environment bridge and outer wrapper of a Lua artifact.
//!
//! The protected body runs as `REG[1](ENV)` under `pcall`, where `ENV` is a
//! private copy of the host's globals. Writes to globals land in the copy;
//! `ENV._G` points back at the copy so `_G` lookups stay inside it.

use rand::Rng;
use std::fmt::Write;
use vexile_transform::Weaver;

/// Prefix of the diagnostic printed when the protected body errors.
pub const FATAL_PREFIX: &str = "Vexile VM Fatal: ";

/// Wrap `body` (a function body whose `...` is the environment) into a
/// self-invoking chunk. `prologue` runs first, outside the protected call.
pub fn wrap<R: Rng + ?Sized>(w: &mut Weaver<'_, R>, prologue: &str, body: &str) -> String {
    let reg = w.fresh_name();
    let env = w.fresh_name();
    let bridge = w.fresh_name();
    let src = w.fresh_name();
    let (k, v) = (w.fresh_name(), w.fresh_name());
    let (ok, err) = (w.fresh_name(), w.fresh_name());
    let one = w.num(1);

    let mut out = String::with_capacity(body.len() + prologue.len() + 512);
    out.push_str("(function()\n");
    out.push_str(prologue);
    let _ = write!(
        out,
        "local {reg}, {env} = {{}}, {{}}\n\
         local function {bridge}()\n\
         local {src} = (getgenv and getgenv()) or _G\n\
         for {k}, {v} in pairs({src}) do {env}[{k}] = {v} end\n\
         if getfenv then\n\
         for {k}, {v} in pairs(getfenv(0)) do if {env}[{k}] == nil then {env}[{k}] = {v} end end\n\
         end\n\
         {env}._G = {env}\n\
         end\n\
         {bridge}()\n\
         {reg}[{one}] = function(...)\n\
         {body}\n\
         end\n\
         local {ok}, {err} = pcall({reg}[{one}], {env})\n\
         if not {ok} and {err} then (warn or print)(\"{FATAL_PREFIX}\" .. tostring({err})) end\n\
         end)()\n"
    );
    out
}

/// Body prologue of the raw (non-virtualized) path: bind the environment
/// argument and, where the host supports it, make it the function's
/// global table.
pub fn raw_prologue<R: Rng + ?Sized>(w: &mut Weaver<'_, R>) -> String {
    let env = w.fresh_name();
    let level = w.num(1);
    format!("local {env} = ...\nif setfenv then setfenv({level}, {env}) end\n")
}
