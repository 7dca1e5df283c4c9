//! What gets copied where, and which anchored patches wire the tracer in.
//!
//! Each rule is file-scoped and named. When upstream changes shape, only the
//! rule whose anchor broke needs updating; the drift error names it.

use std::path::PathBuf;

use deptrace_core::{PatchSet, PatchSpec};

use crate::layout::Layout;

/// A source tree or file to mirror into an upstream checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transplant {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Tracer Go package and its `init()` registration shim for go-ethereum.
pub fn node_transplants(layout: &Layout) -> Vec<Transplant> {
    let live = layout.node_tracer_dir();
    vec![
        Transplant {
            source: layout.tracer_dir.join("dep_tracer"),
            destination: live.join("dep_tracer"),
        },
        Transplant {
            source: layout.tracer_dir.join("dep.go"),
            destination: live.join("dep.go"),
        },
    ]
}

/// The build script that links `libdep` into foundry's evm crate.
///
/// `tracevm` itself is not copied; the workspace manifest points at
/// [`Layout::tracevm_dir`] in place.
pub fn toolchain_transplants(layout: &Layout) -> Vec<Transplant> {
    vec![Transplant {
        source: layout.tracer_dir.join("extra").join("build_foundry.rs"),
        destination: layout.in_toolchain("crates/evm/evm/build.rs"),
    }]
}

/// One inspector callback that gets a tracer delegation prepended.
struct InspectorHook {
    name: &'static str,
    signature: &'static str,
    call: &'static str,
}

// Signatures tolerate whitespace and trailing-comma drift; argument names are
// captured so the delegation uses whatever upstream calls them.
const INSPECTOR_HOOKS: &[InspectorHook] = &[
    InspectorHook {
        name: "inspector.step",
        signature: r"fn step\(\s*&mut self,\s*(?P<interp>\w+): &mut Interpreter,\s*(?P<ecx>\w+): &mut EvmContext<[^>]*>,?\s*\)\s*\{",
        call: "tracevm::dep_step(&mut self.dep, ${interp}, ${ecx});",
    },
    InspectorHook {
        name: "inspector.step_end",
        signature: r"fn step_end\(\s*&mut self,\s*(?P<interp>\w+): &mut Interpreter,\s*(?P<ecx>\w+): &mut EvmContext<[^>]*>,?\s*\)\s*\{",
        call: "tracevm::dep_step_end(&mut self.dep, ${interp}, ${ecx});",
    },
    InspectorHook {
        name: "inspector.call",
        signature: r"fn call\(\s*&mut self,\s*(?P<ecx>\w+): &mut EvmContext<[^>]*>,\s*(?P<inputs>\w+): &mut CallInputs,?\s*\)\s*->\s*Option<CallOutcome>\s*\{",
        call: "tracevm::dep_call(&mut self.dep, ${ecx}, ${inputs});",
    },
    InspectorHook {
        name: "inspector.call_end",
        signature: r"fn call_end\(\s*&mut self,\s*(?P<ecx>\w+): &mut EvmContext<[^>]*>,\s*(?P<inputs>\w+): &CallInputs,\s*(?P<outcome>\w+): CallOutcome,?\s*\)\s*->\s*CallOutcome\s*\{",
        call: "tracevm::dep_call_end(&mut self.dep, ${ecx}, ${inputs}, &${outcome});",
    },
    InspectorHook {
        name: "inspector.create",
        signature: r"fn create\(\s*&mut self,\s*(?P<ecx>\w+): &mut EvmContext<[^>]*>,\s*(?P<inputs>\w+): &mut CreateInputs,?\s*\)\s*->\s*Option<CreateOutcome>\s*\{",
        call: "tracevm::dep_create(&mut self.dep, ${ecx}, ${inputs});",
    },
    InspectorHook {
        name: "inspector.create_end",
        signature: r"fn create_end\(\s*&mut self,\s*(?P<ecx>\w+): &mut EvmContext<[^>]*>,\s*(?P<inputs>\w+): &CreateInputs,\s*(?P<outcome>\w+): CreateOutcome,?\s*\)\s*->\s*CreateOutcome\s*\{",
        call: "tracevm::dep_create_end(&mut self.dep, ${ecx}, ${inputs}, &${outcome});",
    },
];

pub const WORKSPACE_MANIFEST: &str = "Cargo.toml";
pub const EVM_MANIFEST: &str = "crates/evm/evm/Cargo.toml";
pub const CAST_RUN: &str = "crates/cast/bin/cmd/run.rs";
pub const INSPECTOR_STACK: &str = "crates/evm/evm/src/inspectors/stack.rs";

/// Patch sets applied to the foundry checkout, in order.
pub fn toolchain_patches(layout: &Layout) -> Vec<PatchSet> {
    let dependency = format!(
        "[workspace.dependencies]\ntracevm = {{ path = \"{}\" }}\n",
        layout.tracevm_dependency_path()
    );
    vec![
        PatchSet::new(WORKSPACE_MANIFEST).with(PatchSpec::new(
            "manifest.workspace_dependency",
            r"(?m)^\[workspace\.dependencies\]\n",
            dependency,
        )),
        PatchSet::new(EVM_MANIFEST).with(PatchSpec::new(
            "evm.dependency",
            r"(?m)^\[dependencies\]\n",
            "[dependencies]\ntracevm.workspace = true\n",
        )),
        PatchSet::new(CAST_RUN).with(PatchSpec::new(
            "cast_run.activate",
            r"(?m)^(?P<indent>[ \t]*)(?P<lookup>let tx = provider\s*\.get_transaction_by_hash\((?P<hash>\w+)\))",
            "${indent}tracevm::activate(${hash});\n${indent}${lookup}",
        )),
        inspector_stack_patches(),
    ]
}

fn inspector_stack_patches() -> PatchSet {
    let field = PatchSpec::new(
        "inspector.field",
        r"(?m)^(?P<decl>[ \t]*pub struct InspectorStackInner \{\n)",
        "${decl}    pub dep: tracevm::DepData<0>,\n",
    );

    INSPECTOR_HOOKS.iter().fold(
        PatchSet::new(INSPECTOR_STACK).with(field),
        |set, hook| {
            set.with(PatchSpec::new(
                hook.name,
                hook.signature,
                format!("${{0}}\n        {}", hook.call),
            ))
        },
    )
}
