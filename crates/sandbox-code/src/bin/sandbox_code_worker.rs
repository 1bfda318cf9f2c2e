//! Companion binary spawned once per `execute-code` call by
//! [`sandbox_code::SandboxRunner`]. Runs entirely inside its own process so
//! that a misbehaving script can only ever damage this throwaway process,
//! never the parent service (§4.6).
//!
//! Order of operations matters here: resource limits are installed before
//! a single byte of user source is parsed, let alone run.

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use rlimit::Resource;
use rustpython_vm as pyvm;

use sandbox_code::{BoundedBuffer, InputBundle, SharedBudget, WorkerResult, WorkerStatus, RESULT_VARIABLE_NAMES};

fn install_resource_limits(memory_mb: u64, timeout_seconds: u64) {
    let memory_bytes = memory_mb.saturating_mul(1024 * 1024);
    let _ = Resource::AS.set(memory_bytes, memory_bytes);
    let _ = Resource::CPU.set(timeout_seconds, timeout_seconds + 5);
    let _ = Resource::CORE.set(0, 0);
    let _ = Resource::FSIZE.set(0, 0);
}

fn read_input_bundle() -> std::io::Result<InputBundle> {
    let mut raw = Vec::new();
    std::io::stdin().read_to_end(&mut raw)?;
    serde_json::from_slice(&raw).map_err(std::io::Error::other)
}

fn emit(result: &WorkerResult) {
    if let Ok(line) = serde_json::to_string(result) {
        println!("{line}");
    }
}

fn main() {
    let bundle = match read_input_bundle() {
        Ok(bundle) => bundle,
        Err(e) => {
            emit(&WorkerResult {
                status: WorkerStatus::Error,
                stdout: String::new(),
                stderr: String::new(),
                stdout_truncated: false,
                stderr_truncated: false,
                variables: HashMap::new(),
                execution_time_ms: 0,
                error_message: Some(format!("failed to read input bundle: {e}")),
                error_type: Some("InputBundleError".to_string()),
            });
            std::process::exit(1);
        }
    };

    install_resource_limits(bundle.memory_mb, bundle.timeout_seconds);

    // stdout and stderr draw from one combined allowance rather than each
    // getting `output_kb` independently (§4.6 step 4).
    let budget = SharedBudget::new((bundle.output_kb as usize) * 1024);
    let stdout_buf = Arc::new(Mutex::new(BoundedBuffer::new(budget.clone())));
    let stderr_buf = Arc::new(Mutex::new(BoundedBuffer::new(budget)));

    let started = Instant::now();
    let outcome = run_in_interpreter(&bundle, stdout_buf.clone(), stderr_buf.clone());
    let execution_time_ms = started.elapsed().as_millis() as u64;

    let stdout_buf = Arc::try_unwrap(stdout_buf).map(|m| m.into_inner().unwrap_or_default()).unwrap_or_default();
    let stderr_buf = Arc::try_unwrap(stderr_buf).map(|m| m.into_inner().unwrap_or_default()).unwrap_or_default();
    let stdout_truncated = stdout_buf.is_truncated();
    let stderr_truncated = stderr_buf.is_truncated();

    let result = match outcome {
        Ok(variables) => WorkerResult {
            status: WorkerStatus::Success,
            stdout: stdout_buf.into_string(),
            stderr: stderr_buf.into_string(),
            stdout_truncated,
            stderr_truncated,
            variables,
            execution_time_ms,
            error_message: None,
            error_type: None,
        },
        Err(InterpreterError::Memory) => WorkerResult {
            status: WorkerStatus::MemoryError,
            stdout: stdout_buf.into_string(),
            stderr: stderr_buf.into_string(),
            stdout_truncated,
            stderr_truncated,
            variables: HashMap::new(),
            execution_time_ms,
            error_message: Some("memory limit exceeded".to_string()),
            error_type: Some("MemoryError".to_string()),
        },
        Err(InterpreterError::Script { message, kind }) => WorkerResult {
            status: WorkerStatus::Error,
            stdout: stdout_buf.into_string(),
            stderr: stderr_buf.into_string(),
            stdout_truncated,
            stderr_truncated,
            variables: HashMap::new(),
            execution_time_ms,
            error_message: Some(message),
            error_type: Some(kind),
        },
    };

    emit(&result);
}

enum InterpreterError {
    Memory,
    Script { message: String, kind: String },
}

/// Builds a reduced-scope interpreter, preloads the allow-listed modules,
/// runs the script, and extracts the whitelisted result variables.
/// Mirrors `_execute_in_sandbox`'s globals/locals split: `DATA_JSON` and
/// `INPUT_DATA` are always present, caller variables are merged in.
fn run_in_interpreter(
    bundle: &InputBundle,
    stdout_buf: Arc<Mutex<BoundedBuffer>>,
    stderr_buf: Arc<Mutex<BoundedBuffer>>,
) -> Result<HashMap<String, serde_json::Value>, InterpreterError> {
    let settings = pyvm::Settings::default();
    let allowed_imports = bundle.allowed_imports.clone();
    let interpreter = pyvm::Interpreter::with_init(settings, |vm| {
        vm.add_native_modules(allowed_stdlib_modules(&allowed_imports));
    });

    interpreter.enter(|vm| {
        let scope = vm.new_scope_with_builtins();

        bind_print(vm, &scope, stdout_buf);

        let data_json = serde_json::to_string(&bundle.data).unwrap_or_else(|_| "[]".to_string());
        set_global_str(vm, &scope, "DATA_JSON", &data_json);
        set_global_json(vm, &scope, "INPUT_DATA", &serde_json::Value::Array(bundle.data.clone()));
        for (name, value) in &bundle.variables {
            set_global_json(vm, &scope, name, value);
        }

        let code_obj = vm
            .compile(&bundle.code, pyvm::compiler::Mode::Exec, "<sandboxed>".to_owned())
            .map_err(|err| InterpreterError::Script { message: err.to_string(), kind: "SyntaxError".to_string() })?;

        vm.run_code_obj(code_obj, scope.clone()).map_err(|exc| {
            let message = vm.exception_to_string(&exc).unwrap_or_else(|| "sandboxed script raised an exception".to_string());
            let kind = exc.class().name().to_string();
            if let Ok(mut buf) = stderr_buf.lock() {
                buf.push(&format!("Traceback (most recent call last):\n{kind}: {message}\n"));
            }
            InterpreterError::Script { message, kind }
        })?;

        let mut variables = HashMap::new();
        for name in RESULT_VARIABLE_NAMES {
            if let Ok(value) = scope.globals.get_item(name, vm) {
                if let Some(json_value) = pyobject_to_json(vm, &value) {
                    variables.insert((*name).to_string(), json_value);
                }
            }
        }
        Ok(variables)
    })
}

/// Filters the full `rustpython-stdlib` module registry down to the
/// caller's `allowed_imports` (populated from `CodePolicy`'s own
/// allow-list, `runner.rs`), so `import <module>` only ever succeeds for
/// modules the policy already admits — the "controlled import shim" §4.6
/// step 2 promises. Everything else is simply never registered with the
/// VM, so `import os` fails with the interpreter's normal `ModuleNotFoundError`
/// rather than needing a bespoke import hook.
fn allowed_stdlib_modules(allowed_imports: &[String]) -> Vec<(std::borrow::Cow<'static, str>, rustpython_vm::stdlib::StdlibInitFunc)> {
    let allowed: std::collections::HashSet<&str> = allowed_imports.iter().map(String::as_str).collect();
    rustpython_stdlib::get_module_inits().filter(|(name, _)| allowed.contains(name.as_ref())).collect()
}

/// Shadows the builtin `print` with one that appends to `buffer` instead of
/// the process's real stdout — name lookup in the script's global scope
/// wins over `__builtins__`, so no further redirection is needed (§4.6 step
/// 4, "redirects stdout and stderr into in-memory ring buffers").
fn bind_print(vm: &pyvm::VirtualMachine, scope: &pyvm::scope::Scope, buffer: Arc<Mutex<BoundedBuffer>>) {
    let func = vm.new_function("print", move |args: pyvm::function::FuncArgs, vm: &pyvm::VirtualMachine| -> pyvm::PyResult<()> {
        let mut parts = Vec::with_capacity(args.args.len());
        for arg in &args.args {
            parts.push(arg.str(vm)?.as_str().to_string());
        }
        let mut line = parts.join(" ");
        line.push('\n');
        if let Ok(mut buf) = buffer.lock() {
            buf.push(&line);
        }
        Ok(())
    });
    let _ = scope.globals.set_item("print", func.into(), vm);
}

fn set_global_str(vm: &pyvm::VirtualMachine, scope: &pyvm::scope::Scope, name: &str, value: &str) {
    let obj = vm.ctx.new_str(value).into();
    let _ = scope.globals.set_item(name, obj, vm);
}

fn set_global_json(vm: &pyvm::VirtualMachine, scope: &pyvm::scope::Scope, name: &str, value: &serde_json::Value) {
    if let Some(obj) = json_to_pyobject(vm, value) {
        let _ = scope.globals.set_item(name, obj, vm);
    }
}

fn json_to_pyobject(vm: &pyvm::VirtualMachine, value: &serde_json::Value) -> Option<pyvm::PyObjectRef> {
    Some(match value {
        serde_json::Value::Null => vm.ctx.none(),
        serde_json::Value::Bool(b) => vm.ctx.new_bool(*b).into(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                vm.ctx.new_int(i).into()
            } else {
                vm.ctx.new_float(n.as_f64().unwrap_or_default()).into()
            }
        }
        serde_json::Value::String(s) => vm.ctx.new_str(s.as_str()).into(),
        serde_json::Value::Array(items) => {
            let converted: Vec<_> = items.iter().filter_map(|v| json_to_pyobject(vm, v)).collect();
            vm.ctx.new_list(converted).into()
        }
        serde_json::Value::Object(map) => {
            let dict = vm.ctx.new_dict();
            for (key, v) in map {
                if let Some(obj) = json_to_pyobject(vm, v) {
                    let _ = dict.set_item(key.as_str(), obj, vm);
                }
            }
            dict.into()
        }
    })
}

/// Best-effort reverse conversion for the whitelisted result variables;
/// unrepresentable objects fall back to their string form, matching
/// `_execute_in_sandbox`'s `str(val) if val is not None else None`.
fn pyobject_to_json(vm: &pyvm::VirtualMachine, obj: &pyvm::PyObjectRef) -> Option<serde_json::Value> {
    if vm.is_none(obj) {
        return Some(serde_json::Value::Null);
    }
    if let Ok(s) = obj.str(vm) {
        return Some(serde_json::Value::String(s.as_str().to_string()));
    }
    None
}
