//! End-to-end dispatch across native, stack-machine and linear-memory
//! contracts.

mod common;

use common::*;
use polyvm_exec::codec::{self, Parameter};
use polyvm_exec::{CallRequest, NativeContract, NativeRegistry, SessionState, VmError};
use polyvm_storage::{ContractStore, MemoryStore};
use polyvm_types::{Address, ContractDescriptor};

const ECHO: Address = Address::system(1);

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn deploy_linear(store: &mut MemoryStore, address: Address, script: Script) {
    store
        .put_contract(address, ContractDescriptor::linear_memory(script.code()))
        .unwrap();
}

fn deploy_stack(store: &mut MemoryStore, address: Address, ops: &[StackOp]) {
    store
        .put_contract(address, ContractDescriptor::stack_machine(stack_code(ops)))
        .unwrap();
}

fn echo_natives() -> NativeRegistry {
    let echo = NativeContract::new()
        .with_method("echo", |ctx| Ok(ctx.args().to_vec()))
        .with_method("sum", |ctx| {
            let total: u64 = ctx.params()?.iter().filter_map(Parameter::as_u64).sum();
            Ok(total.to_le_bytes().to_vec())
        })
        .with_method("store", |ctx| {
            let value = ctx.args().to_vec();
            ctx.storage_write(b"last", &value)?;
            ctx.notify(b"stored".to_vec());
            Ok(Vec::new())
        });
    NativeRegistry::new().with_contract(ECHO, echo).unwrap()
}

#[test]
fn test_linear_memory_output() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_linear(&mut store, addr(1), Script::new().ret_bytes(0, "hello"));

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), GAS);
    assert_eq!(report.state, SessionState::Completed);
    assert_eq!(report.output(), Some(&b"hello"[..]));
    assert_eq!(report.gas_used, env.config.gas.ret);
    assert_eq!(report.context_depth, 0);
}

#[test]
fn test_linear_memory_without_ret_returns_empty() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_linear(&mut store, addr(1), Script::new().data(0, "unused"));

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), GAS);
    assert!(report.is_completed());
    assert_eq!(report.output(), Some(&[][..]));
}

#[test]
fn test_linear_memory_input_buffer() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    let args = codec::encode(&[Parameter::from("alice"), Parameter::U64(5)]);
    let input = CallRequest::new("transfer", args.clone()).linear_memory_input();
    deploy_linear(
        &mut store,
        addr(1),
        Script::new()
            .call_into("input_length", &[], 0)
            .call("get_input", &[16])
            .call("ret", &[16, input.len() as u32]),
    );

    let report = invoke(&env, &mut store, addr(1), "transfer", args, GAS);
    assert_eq!(report.output(), Some(input.as_slice()));
}

#[test]
fn test_ret_only_halts_innermost_call() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_linear(&mut store, addr(2), Script::new().ret_bytes(0, "inner").trap("unreachable"));
    deploy_linear(
        &mut store,
        addr(1),
        Script::new()
            .call_contract(0, &addr(2), &CallRequest::new("main", Vec::new()), 100)
            .data(200, "k")
            .data(210, "after")
            .call("storage_write", &[200, 1, 210, 5])
            .data(300, "outer-")
            .call("get_call_output", &[306])
            .call("ret", &[300, 11])
            .trap("unreachable"),
    );

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), GAS);
    assert_eq!(report.state, SessionState::Completed, "{:?}", report.error());
    assert_eq!(report.output(), Some(&b"outer-inner"[..]));
    drop(report);

    assert_eq!(store.read(&addr(1), b"k").unwrap(), Some(b"after".to_vec()));
}

#[test]
fn test_linear_memory_calls_stack_machine() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_stack(
        &mut store,
        addr(2),
        &[StackOp::EmitCaller, StackOp::EmitMethod, StackOp::EmitInput],
    );

    let args = codec::encode(&[Parameter::U32(7)]);
    let expected_len = 20 + "balance".len() + args.len();
    deploy_linear(
        &mut store,
        addr(1),
        Script::new()
            .call_contract(0, &addr(2), &CallRequest::new("balance", args.clone()), 100)
            .call("get_call_output", &[200])
            .call("ret", &[200, expected_len as u32]),
    );

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), GAS);
    let mut expected = addr(1).as_bytes().to_vec();
    expected.extend_from_slice(b"balance");
    expected.extend_from_slice(&args);
    assert_eq!(report.output(), Some(expected.as_slice()));
}

#[test]
fn test_call_output_length_reported() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_linear(&mut store, addr(2), Script::new().ret_bytes(0, "twelve bytes"));
    deploy_linear(
        &mut store,
        addr(1),
        Script::new()
            .call_contract(0, &addr(2), &CallRequest::new("main", Vec::new()), 100)
            .call_into("call_output_length", &[], 104)
            .call("ret", &[100, 8]),
    );

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), GAS);
    assert_eq!(report.output(), Some(&[12, 0, 0, 0, 12, 0, 0, 0][..]));
}

#[test]
fn test_stack_machine_calls_linear_memory() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_linear(
        &mut store,
        addr(2),
        Script::new()
            .call("caller_address", &[0])
            .call("entry_address", &[20])
            .call("ret", &[0, 40]),
    );
    deploy_stack(
        &mut store,
        addr(1),
        &[StackOp::Call {
            target: [2; 20],
            method: "who".into(),
            args: Vec::new(),
        }],
    );

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), GAS);
    let mut expected = addr(1).as_bytes().to_vec();
    expected.extend_from_slice(addr(1).as_bytes());
    assert_eq!(report.output(), Some(expected.as_slice()));
}

#[test]
fn test_stack_machine_calls_native() {
    init_tracing();
    let env = env_with_natives(echo_natives());
    let mut store = MemoryStore::new();
    let args = codec::encode(&[Parameter::U64(40), Parameter::U32(2)]);
    deploy_stack(
        &mut store,
        addr(1),
        &[StackOp::Call {
            target: *ECHO.as_bytes(),
            method: "sum".into(),
            args,
        }],
    );

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), GAS);
    assert_eq!(report.output(), Some(&42u64.to_le_bytes()[..]));

    let schedule = env.config.gas;
    assert_eq!(report.gas_used, schedule.call_contract + schedule.native_invoke);
}

#[test]
fn test_native_storage_is_scoped_to_native_address() {
    init_tracing();
    let env = env_with_natives(echo_natives());
    let mut store = MemoryStore::new();

    let report = invoke(&env, &mut store, ECHO, "store", b"payload".to_vec(), GAS);
    assert!(report.is_completed());
    assert_eq!(report.notifications().len(), 1);
    assert_eq!(report.notifications()[0].contract, ECHO);
    drop(report);

    assert_eq!(store.read(&ECHO, b"last").unwrap(), Some(b"payload".to_vec()));
}

#[test]
fn test_stack_machine_rejects_malformed_args() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_stack(&mut store, addr(1), &[StackOp::Emit { bytes: vec![1] }]);

    let report = invoke(&env, &mut store, addr(1), "main", vec![0x01, 0x03], GAS);
    assert_eq!(report.state, SessionState::Faulted);
    assert!(matches!(report.error(), Some(VmError::MalformedEncoding(_))));
    assert_eq!(report.context_depth, 0);
}

#[test]
fn test_gas_exhaustion_at_depth_two_unwinds_everything() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_linear(
        &mut store,
        addr(3),
        Script::new()
            .data(0, "k")
            .data(10, "v")
            .call("storage_write", &[0, 1, 10, 1]),
    );
    deploy_stack(
        &mut store,
        addr(2),
        &[
            StackOp::Call {
                target: [3; 20],
                method: "write".into(),
                args: Vec::new(),
            },
            StackOp::Emit { bytes: b"unreachable".to_vec() },
        ],
    );
    deploy_linear(
        &mut store,
        addr(1),
        Script::new()
            .data(500, "started")
            .call("notify", &[500, 7])
            .call_contract(0, &addr(2), &CallRequest::new("main", Vec::new()), 100)
            .ret_bytes(600, "unreachable"),
    );

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), 1_000);
    assert_eq!(report.state, SessionState::Faulted);
    assert_eq!(
        report.error(),
        Some(&VmError::InsufficientGas {
            required: 4_000,
            remaining: 880
        })
    );
    assert_eq!(report.gas_used, 120);
    assert_eq!(report.context_depth, 0);
    assert!(report.notifications().is_empty());
    assert!(report.output().is_none());
    drop(report);

    assert_eq!(store.read(&addr(3), b"k").unwrap(), None);
}

#[test]
fn test_nested_fault_discards_notifications() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_stack(
        &mut store,
        addr(2),
        &[
            StackOp::Notify { payload: b"inner".to_vec() },
            StackOp::Fail { message: "bad state".into() },
        ],
    );
    deploy_linear(
        &mut store,
        addr(1),
        Script::new()
            .data(500, "outer")
            .call("notify", &[500, 5])
            .call_contract(0, &addr(2), &CallRequest::new("main", Vec::new()), 100),
    );

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), GAS);
    assert_eq!(report.state, SessionState::Faulted);
    assert_eq!(report.error(), Some(&VmError::EngineFault("bad state".into())));
    assert!(report.notifications().is_empty());
    assert_eq!(report.context_depth, 0);
}

#[test]
fn test_recursion_is_bounded_by_gas() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_linear(
        &mut store,
        addr(1),
        Script::new().call_contract(0, &addr(1), &CallRequest::new("main", Vec::new()), 100),
    );

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), 200);
    assert_eq!(report.state, SessionState::Faulted);
    assert_eq!(
        report.error(),
        Some(&VmError::InsufficientGas {
            required: 10,
            remaining: 0
        })
    );
    assert_eq!(report.gas_used, 200);
    assert_eq!(report.context_depth, 0);
}

#[test]
fn test_call_to_missing_contract_faults_caller() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_linear(
        &mut store,
        addr(1),
        Script::new().call_contract(0, &addr(9), &CallRequest::new("main", Vec::new()), 100),
    );

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), GAS);
    assert_eq!(report.error(), Some(&VmError::ContractNotFound(addr(9))));
    assert_eq!(report.context_depth, 0);
}

#[test]
fn test_top_level_missing_contract() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();

    let report = invoke(&env, &mut store, addr(7), "main", Vec::new(), GAS);
    assert_eq!(report.state, SessionState::Faulted);
    assert_eq!(report.error(), Some(&VmError::ContractNotFound(addr(7))));
    assert_eq!(report.gas_used, 0);
}

#[test]
fn test_malformed_call_payload() {
    init_tracing();
    let env = env();
    let mut store = MemoryStore::new();
    deploy_linear(
        &mut store,
        addr(1),
        Script::new()
            .data(0, addr(1).as_bytes())
            .data(20, [0u8, 0, 0, 0, 0x20])
            .call("call_contract", &[0, 20, 5]),
    );

    let report = invoke(&env, &mut store, addr(1), "main", Vec::new(), GAS);
    assert!(matches!(report.error(), Some(VmError::MalformedEncoding(_))));
    assert_eq!(report.context_depth, 0);
}
