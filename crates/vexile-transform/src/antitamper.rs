//! Anti-tamper weaver.
//!
//! Emits a fresh global crash routine and a probe block guarded by an
//! opaque predicate. Probes check that `print` is a native function, that a
//! random canary key is absent from `_G`, and that a table with a locked
//! metatable still behaves as built. A failing probe calls the crash
//! routine, which spins forever so a protected call never returns.
//!
//! Probe names are built with `string.char` so they never appear as
//! literals. The fragment declares no locals that nested functions capture.

use crate::Weaver;
use rand::Rng;
use std::fmt::Write;
use vexile_core::CrashRoutine;

/// Generated fragment and the global it binds the crash routine to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AntiTamper {
    pub crash: String,
    pub source: String,
}

/// Build the probe fragment. `plus` re-arms the probes on the host's task
/// scheduler every `rearm_seconds`.
pub fn weave<R: Rng + ?Sized>(w: &mut Weaver<'_, R>, plus: bool) -> AntiTamper {
    let crash = w.fresh_name();
    let mut out = match w.tuning().crash {
        CrashRoutine::Spin => format!("{crash} = function() while true do end end\n"),
        CrashRoutine::Noop => format!("{crash} = function() end\n"),
    };

    let probes = probe_block(w, &crash);
    out.push_str(&probes);

    if plus {
        let period = i64::from(w.tuning().rearm_seconds.max(1));
        let period = w.num(period);
        let again = probe_block(w, &crash);
        let _ = write!(
            out,
            "if task and task.spawn and task.wait then\n\
             task.spawn(function()\n\
             while task.wait({period}) do\n{again}end\n\
             end)\n\
             end\n"
        );
    }
    tracing::debug!(plus, bytes = out.len(), "wove anti-tamper probes");
    AntiTamper { crash, source: out }
}

/// One guarded round of every probe.
fn probe_block<R: Rng + ?Sized>(w: &mut Weaver<'_, R>, crash: &str) -> String {
    let guard = w.opaque_predicate();
    let mut out = format!("if {guard} then\n");
    out.push_str(&native_probe(w, crash));
    out.push_str(&canary_probe(w, crash));
    out.push_str(&metatable_probe(w, crash));
    out.push_str("end\n");
    out
}

/// `print` must report itself as a C function through whichever debug
/// interface the host offers.
fn native_probe<R: Rng + ?Sized>(w: &mut Weaver<'_, R>, crash: &str) -> String {
    let dbg = w.fresh_name();
    let getinfo = w.fresh_name();
    let info = w.fresh_name();
    let lookup = w.fresh_name();
    let k_getinfo = w.hidden("getinfo");
    let k_what = w.hidden("what");
    let k_c = w.hidden("C");
    let k_info = w.hidden("info");
    let k_s = w.hidden("s");
    let k_native = w.hidden("[C]");
    format!(
        "local {dbg} = debug\n\
         if {dbg} and print then\n\
         local {getinfo} = {dbg}[{k_getinfo}]\n\
         local {lookup} = {dbg}[{k_info}]\n\
         if {getinfo} then\n\
         local {info} = {getinfo}(print)\n\
         if {info} and {info}[{k_what}] ~= {k_c} then {crash}() end\n\
         elseif {lookup} then\n\
         if {lookup}(print, {k_s}) ~= {k_native} then {crash}() end\n\
         end\n\
         end\n"
    )
}

/// A key nobody should define must read as nil through `_G`, even when
/// `__index` is hooked.
fn canary_probe<R: Rng + ?Sized>(w: &mut Weaver<'_, R>, crash: &str) -> String {
    let canary = w.fresh_name();
    let key = w.hidden(&canary);
    format!("if _G and _G[{key}] ~= nil then {crash}() end\n")
}

/// A proxy whose `__index` echoes the key and whose metatable is locked.
/// A hooked `setmetatable` / `getmetatable` pair gives itself away.
fn metatable_probe<R: Rng + ?Sized>(w: &mut Weaver<'_, R>, crash: &str) -> String {
    let meta = w.fresh_name();
    let proxy = w.fresh_name();
    let t = w.fresh_name();
    let k = w.fresh_name();
    let lock = w.fresh_name();
    let probe_key = w.fresh_name();
    let k_index = w.hidden("__index");
    let k_metatable = w.hidden("__metatable");
    let k_lock_text = format!("Locked{}", w.rng().gen_range(100..1000));
    let k_lock = w.hidden(&k_lock_text);
    let k_probe_text = w.fresh_name();
    let k_probe = w.hidden(&k_probe_text);
    format!(
        "if setmetatable and getmetatable then\n\
         local {lock} = {k_lock}\n\
         local {probe_key} = {k_probe}\n\
         local {meta} = {{}}\n\
         {meta}[{k_index}] = function({t}, {k}) return {k} end\n\
         {meta}[{k_metatable}] = {lock}\n\
         local {proxy} = setmetatable({{}}, {meta})\n\
         if getmetatable({proxy}) ~= {lock} or {proxy}[{probe_key}] ~= {probe_key} then {crash}() end\n\
         end\n"
    )
}
