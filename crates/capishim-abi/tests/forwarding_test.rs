//! Integration tests for the exported trampolines and control surface.

use std::ffi::{CStr, c_char, c_double, c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, MutexGuard};
use std::thread;

use capishim_abi::control::{
    capishim_init, capishim_resolve_all, capishim_shutdown, capishim_stats_count,
    capishim_stats_snapshot, capishim_symbol_name,
};
use capishim_abi::symbols::{
    PyDict_New, PyErr_Clear, PyErr_NewException, PyFloat_AsDouble, PyFloat_FromDouble,
    PyObject_Call, PyOS_vsnprintf,
};
use capishim_abi::types::{PyObject, VaListPtr};
use capishim_abi::{CStatsRecord, SYMBOLS, Symbol, registry};
use capishim_core::{Contract, LogMode, LogSink, TableResolver};

static TEST_LOCK: Mutex<()> = Mutex::new(());
static LAST_CALL: Mutex<Option<[usize; 3]>> = Mutex::new(None);
static CLEAR_CALLS: AtomicUsize = AtomicUsize::new(0);
static LAST_DOUBLE: AtomicU64 = AtomicU64::new(0);
static LAST_VA: AtomicUsize = AtomicUsize::new(0);

const CALL_RESULT: *mut PyObject = ptr::without_provenance_mut(0x5151);
const EXC_RESULT: *mut PyObject = ptr::without_provenance_mut(0xE0E0);
const DICT_RESULT: *mut PyObject = ptr::without_provenance_mut(0xD1C7);
const FLOAT_RESULT: *mut PyObject = ptr::without_provenance_mut(0xF10A);

unsafe extern "C" fn call_stub(
    callable: *mut PyObject,
    args: *mut PyObject,
    kwargs: *mut PyObject,
) -> *mut PyObject {
    *LAST_CALL.lock().unwrap() = Some([callable.addr(), args.addr(), kwargs.addr()]);
    CALL_RESULT
}

unsafe extern "C" fn new_exception_stub(
    _name: *const c_char,
    _base: *mut PyObject,
    _dict: *mut PyObject,
) -> *mut PyObject {
    EXC_RESULT
}

unsafe extern "C" fn dict_new_stub() -> *mut PyObject {
    DICT_RESULT
}

unsafe extern "C" fn err_clear_stub() {
    CLEAR_CALLS.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn float_from_double_stub(v: c_double) -> *mut PyObject {
    LAST_DOUBLE.store(v.to_bits(), Ordering::SeqCst);
    FLOAT_RESULT
}

unsafe extern "C" fn float_as_double_stub(_o: *mut PyObject) -> c_double {
    -0.125
}

unsafe extern "C" fn vsnprintf_stub(
    _buf: *mut c_char,
    size: usize,
    _format: *const c_char,
    vargs: VaListPtr,
) -> c_int {
    LAST_VA.store(vargs.as_raw().addr(), Ordering::SeqCst);
    c_int::try_from(size).unwrap_or(-1)
}

fn stub_table() -> TableResolver {
    TableResolver::new()
        .with("PyObject_Call", call_stub as *const ())
        .with("PyErr_NewException", new_exception_stub as *const ())
        .with("PyDict_New", dict_new_stub as *const ())
        .with("PyErr_Clear", err_clear_stub as *const ())
        .with("PyFloat_FromDouble", float_from_double_stub as *const ())
        .with("PyFloat_AsDouble", float_as_double_stub as *const ())
        .with("PyOS_vsnprintf", vsnprintf_stub as *const ())
}

/// Lock, reset the global registry and bind it to `table`.
fn setup(table: TableResolver) -> (MutexGuard<'static, ()>, Arc<TableResolver>) {
    let guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let registry = registry();
    registry.shutdown(false);
    registry.set_stats_enabled(cfg!(feature = "stats"));
    registry.stats().set_dump_every(0);
    registry.set_log_mode(LogMode::Off);
    registry.replace_sink(LogSink::discard());
    *LAST_CALL.lock().unwrap() = None;
    CLEAR_CALLS.store(0, Ordering::SeqCst);

    let table = Arc::new(table);
    registry.install_resolver(table.clone());
    (guard, table)
}

#[test]
fn three_pointer_call_is_forwarded_transparently() {
    let (_guard, table) = setup(stub_table());
    let callable = ptr::without_provenance_mut::<PyObject>(0x10);
    let args = ptr::without_provenance_mut::<PyObject>(0x20);

    let result = unsafe { PyObject_Call(callable, args, ptr::null_mut()) };
    assert_eq!(result, CALL_RESULT);
    assert_eq!(*LAST_CALL.lock().unwrap(), Some([0x10, 0x20, 0]));

    let again = unsafe { PyObject_Call(callable, args, ptr::null_mut()) };
    assert_eq!(again, CALL_RESULT);
    assert_eq!(table.lookups("PyObject_Call"), 1);
}

#[test]
fn scalar_and_void_symbols_pass_through() {
    let (_guard, _table) = setup(stub_table());

    assert_eq!(unsafe { PyFloat_FromDouble(1.5) }, FLOAT_RESULT);
    assert_eq!(f64::from_bits(LAST_DOUBLE.load(Ordering::SeqCst)), 1.5);
    assert_eq!(unsafe { PyFloat_AsDouble(FLOAT_RESULT) }, -0.125);

    unsafe { PyErr_Clear() };
    unsafe { PyErr_Clear() };
    assert_eq!(CLEAR_CALLS.load(Ordering::SeqCst), 2);
}

#[test]
fn va_list_handle_is_forwarded_unchanged() {
    let (_guard, _table) = setup(stub_table());
    let va = VaListPtr::from_raw(ptr::without_provenance_mut(0x7A11));
    let mut buf = [0 as c_char; 8];

    let rc = unsafe { PyOS_vsnprintf(buf.as_mut_ptr(), buf.len(), c"%d".as_ptr(), va) };
    assert_eq!(rc, 8);
    assert_eq!(LAST_VA.load(Ordering::SeqCst), 0x7A11);
}

#[test]
fn concurrent_first_calls_resolve_once() {
    let (_guard, table) = setup(stub_table());
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..100)
                    .map(|_| unsafe { PyDict_New() }.addr())
                    .all(|addr| addr == DICT_RESULT.addr())
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(table.lookups("PyDict_New"), 1);
}

#[cfg(feature = "stats")]
#[test]
fn statistics_follow_calls() {
    let (_guard, _table) = setup(stub_table());
    let registry = registry();

    for _ in 0..4 {
        unsafe { PyDict_New() };
    }
    let snapshot = registry.stats_snapshot();
    assert_eq!(snapshot.get("PyDict_New").unwrap().calls, 4);
    assert_eq!(snapshot.total_calls, 4);
    assert_eq!(snapshot.symbols.len(), SYMBOLS.len());
    assert_eq!(
        snapshot.symbols[0].symbol,
        Symbol::ALL[Symbol::ALL.len() - 1].name()
    );
}

#[test]
fn disabled_statistics_do_not_change_results() {
    let (_guard, _table) = setup(stub_table());
    let registry = registry();
    registry.set_stats_enabled(false);

    assert_eq!(unsafe { PyDict_New() }, DICT_RESULT);
    assert_eq!(registry.stats().total_calls(), 0);
    assert_eq!(registry.entry(Symbol::PyDict_New.id()).stats().calls(), 0);
}

#[cfg(feature = "call-log")]
#[test]
fn call_log_renders_arguments() {
    let (_guard, _table) = setup(stub_table());
    let registry = registry();
    let (sink, buffer) = LogSink::to_buffer();
    registry.replace_sink(sink);
    registry.set_log_mode(LogMode::Calls);

    let result = unsafe { PyErr_NewException(c"mod.Error".as_ptr(), ptr::null_mut(), ptr::null_mut()) };
    registry.set_log_mode(LogMode::Off);
    assert_eq!(result, EXC_RESULT);

    let entries = buffer.entries();
    let call = entries.iter().find(|e| e.event == "call").unwrap();
    assert_eq!(call.symbol.as_deref(), Some("PyErr_NewException"));
    assert_eq!(
        call.args.as_deref(),
        Some(&["\"mod.Error\"".to_string(), "NULL".to_string(), "NULL".to_string()][..])
    );
    let ret = entries.iter().find(|e| e.event == "return").unwrap();
    assert_eq!(ret.result.as_deref(), Some("0xe0e0"));
}

unsafe extern "C" fn host_lookup(name: *const c_char) -> *mut c_void {
    // SAFETY: the registry passes NUL-terminated names.
    match unsafe { CStr::from_ptr(name) }.to_bytes() {
        b"PyDict_New" => dict_new_stub as *const () as *mut c_void,
        b"PyErr_Clear" => err_clear_stub as *const () as *mut c_void,
        _ => ptr::null_mut(),
    }
}

#[test]
fn control_surface_installs_and_reports() {
    let (_guard, _table) = setup(TableResolver::new());
    capishim_shutdown();

    assert_eq!(unsafe { capishim_init(None) }, -1);
    assert_eq!(unsafe { capishim_init(Some(host_lookup)) }, 0);
    assert_eq!(unsafe { capishim_init(Some(host_lookup)) }, 1);

    assert_eq!(unsafe { PyDict_New() }, DICT_RESULT);
    let missing = capishim_resolve_all();
    let unimplemented = SYMBOLS
        .iter()
        .filter(|decl| decl.contract == Contract::Unimplemented)
        .count();
    assert_eq!(
        usize::try_from(missing).unwrap(),
        SYMBOLS.len() - 2 - unimplemented
    );

    assert_eq!(capishim_stats_count(), SYMBOLS.len());
    assert_eq!(
        unsafe { capishim_stats_snapshot(ptr::null_mut(), 0) },
        SYMBOLS.len()
    );
    let mut records = [CStatsRecord::default(); 3];
    let written = unsafe { capishim_stats_snapshot(records.as_mut_ptr(), records.len()) };
    assert_eq!(written, 3);
    let head = unsafe { CStr::from_ptr(records[0].name) };
    assert_eq!(head.to_str().unwrap(), Symbol::ALL[Symbol::ALL.len() - 1].name());

    for (index, symbol) in Symbol::ALL.iter().enumerate() {
        let name = unsafe { CStr::from_ptr(capishim_symbol_name(index)) };
        assert_eq!(name.to_str().unwrap(), symbol.name());
    }
    assert!(capishim_symbol_name(SYMBOLS.len()).is_null());

    capishim_shutdown();
    assert!(!registry().has_resolver());
    assert_eq!(capishim_resolve_all(), -1);
}

#[cfg(all(feature = "c-variadic", target_os = "linux"))]
#[test]
fn variadic_wrapper_matches_va_list_form() {
    use capishim_abi::variadic::PyOS_snprintf;

    let (_guard, _table) = setup(TableResolver::new());
    // SAFETY: RTLD_DEFAULT lookup of a libc function with a static name.
    let vsnprintf = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c"vsnprintf".as_ptr()) };
    assert!(!vsnprintf.is_null());
    registry().install_resolver(Arc::new(
        TableResolver::new().with("PyOS_vsnprintf", vsnprintf.cast_const().cast::<()>()),
    ));

    let mut via_shim = [0 as c_char; 32];
    let mut direct = [0 as c_char; 32];
    let shim_rc = unsafe {
        PyOS_snprintf(
            via_shim.as_mut_ptr(),
            via_shim.len(),
            c"%d-%s-%.2f".as_ptr(),
            7 as c_int,
            c"x".as_ptr(),
            0.5 as c_double,
        )
    };
    let direct_rc = unsafe {
        libc::snprintf(
            direct.as_mut_ptr(),
            direct.len(),
            c"%d-%s-%.2f".as_ptr(),
            7 as c_int,
            c"x".as_ptr(),
            0.5 as c_double,
        )
    };
    assert_eq!(shim_rc, direct_rc);
    let shim_text = unsafe { CStr::from_ptr(via_shim.as_ptr()) };
    let direct_text = unsafe { CStr::from_ptr(direct.as_ptr()) };
    assert_eq!(shim_text, direct_text);
    assert_eq!(shim_text.to_str().unwrap(), "7-x-0.50");
}

#[test]
fn noreturn_exports_are_declared_noreturn() {
    let exit = SYMBOLS[Symbol::Py_Exit.id().index()];
    assert_eq!(exit.contract, Contract::NoReturn);
    assert_eq!(exit.name.to_str().unwrap(), "Py_Exit");
    assert!(Symbol::Py_Exit.signature().ends_with(") -> !"));

    for symbol in Symbol::ALL {
        let noreturn = symbol.decl().contract == Contract::NoReturn;
        assert_eq!(symbol.signature().ends_with("-> !"), noreturn, "{}", symbol.name());
    }
    assert_eq!(Symbol::PyCell_Set.decl().contract, Contract::Unimplemented);
}
