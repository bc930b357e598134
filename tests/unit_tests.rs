//! Integration tests for the binding layer, driven through the in-memory
//! host exactly as script code would drive a real runtime.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use lualite::prelude::*;
use rustc_hash::FxHashMap;

/// Call method `name` on the wrapper at `object` with integer arguments,
/// leaving `nresults` results on the stack.
fn call_method(
    state: &mut State,
    object: i32,
    name: &str,
    args: &[i64],
    nresults: usize,
) -> Result<(), NativeError> {
    let object = state.abs_index(object);
    state.raw_get_field(object, name);
    state.push_value(object);
    for arg in args {
        state.push_integer(*arg);
    }
    state.call(args.len() + 1, Some(nresults))
}

// =============================================================================
// Value codec
// =============================================================================

fn round_trip<T: ToScript + FromScript>(state: &mut State, value: T) -> T {
    let pushed = value.to_script(state).unwrap();
    assert_eq!(pushed, 1);
    let back = T::from_script(state, -1).unwrap();
    state.set_top(0);
    back
}

#[test]
fn test_primitive_round_trips() {
    let mut state = State::new();
    for value in [0i64, -1, i64::MIN, i64::MAX] {
        assert_eq!(round_trip(&mut state, value), value);
    }
    assert_eq!(round_trip(&mut state, i8::MIN), i8::MIN);
    assert_eq!(round_trip(&mut state, u8::MAX), u8::MAX);
    assert_eq!(round_trip(&mut state, u32::MAX), u32::MAX);
    assert_eq!(round_trip(&mut state, u64::MAX), u64::MAX);
    assert_eq!(round_trip(&mut state, usize::MAX), usize::MAX);
    assert!(round_trip(&mut state, true));
    assert!(!round_trip(&mut state, false));
    assert_eq!(round_trip(&mut state, -0.5f64), -0.5);
    assert_eq!(round_trip(&mut state, f64::MAX), f64::MAX);
    assert_eq!(round_trip(&mut state, 1.25f32), 1.25);
    assert_eq!(round_trip(&mut state, String::new()), "");
    assert_eq!(round_trip(&mut state, "snow ☃".to_owned()), "snow ☃");
    assert_eq!(
        round_trip(&mut state, LightUserData::from_address(0x1000)),
        LightUserData::from_address(0x1000)
    );
}

#[test]
fn test_decode_reports_slot_kind() {
    let mut state = State::new();
    state.push_string("x");
    let err = i64::from_script(&mut state, 1).unwrap_err();
    assert_eq!(
        err,
        NativeError::TypeMismatch {
            index: 1,
            expected: "integer",
            actual: "string"
        }
    );
    let err = i64::from_script(&mut state, 2).unwrap_err();
    assert_eq!(err, NativeError::StackUnderflow { index: 2, top: 1 });
}

#[test]
fn test_untyped_occupies_no_slots() {
    let mut state = State::new();
    assert_eq!(Untyped.to_script(&mut state).unwrap(), 0);
    assert_eq!(state.top(), 0);
    assert_eq!(Untyped::from_script(&mut state, 1).unwrap(), Untyped);
}

#[test]
fn test_nested_tuple_is_a_fixed_table() {
    let mut state = State::new();
    (("a", 1), 2.5).to_script(&mut state).unwrap();
    assert_eq!(state.top(), 2);
    assert!(state.is_table(1));
    assert_eq!(state.raw_len(1), 2);
    let pair = <(String, i64)>::from_script(&mut state, 1).unwrap();
    assert_eq!(pair, ("a".to_owned(), 1));
}

// =============================================================================
// Value codec through bound functions
// =============================================================================

#[test]
fn test_integer_narrowing_is_checked() {
    let mut state = State::new();
    Module::new(&mut state)
        .function("byte", |b: u8| b)
        .build()
        .unwrap();

    assert_eq!(call_global::<i64, _>(&mut state, "byte", (200,)).unwrap(), 200);
    let err = call_global::<i64, _>(&mut state, "byte", (300,)).unwrap_err();
    assert_eq!(
        err,
        NativeError::Conversion(ConversionError::IntegerOverflow {
            value: 300,
            target_type: "u8"
        })
    );
    assert_eq!(state.top(), 0);
}

#[test]
fn test_string_and_float_arguments() {
    let mut state = State::new();
    Module::new(&mut state)
        .function("greet", |name: String, times: i64| name.repeat(times as usize))
        .function("half", |x: f64| x / 2.0)
        .build()
        .unwrap();

    let greeting: String = call_global(&mut state, "greet", ("ab", 3)).unwrap();
    assert_eq!(greeting, "ababab");
    let half: f64 = call_global(&mut state, "half", (5,)).unwrap();
    assert_eq!(half, 2.5);
}

#[test]
fn test_boolean_is_strict() {
    let mut state = State::new();
    Module::new(&mut state)
        .function("not", |b: bool| !b)
        .build()
        .unwrap();

    assert!(!call_global::<bool, _>(&mut state, "not", (true,)).unwrap());
    let err = call_global::<bool, _>(&mut state, "not", (1,)).unwrap_err();
    assert!(matches!(err, NativeError::TypeMismatch { index: 1, .. }));
}

#[test]
fn test_optional_arguments_and_results() {
    let mut state = State::new();
    Module::new(&mut state)
        .function("or_zero", |n: Option<i64>| n.unwrap_or(0))
        .function("positive", |n: i64| (n > 0).then_some(n))
        .build()
        .unwrap();

    state.get_global("or_zero");
    state.push_nil();
    state.call(1, Some(1)).unwrap();
    assert_eq!(state.to_integer(-1), Some(0));
    state.pop(1);

    let none: Option<i64> = call_global(&mut state, "positive", (-2,)).unwrap();
    assert_eq!(none, None);
    let some: Option<i64> = call_global(&mut state, "positive", (2,)).unwrap();
    assert_eq!(some, Some(2));
}

#[test]
fn test_tuple_results_are_multiple_values() {
    let mut state = State::new();
    Module::new(&mut state)
        .function("divmod", |a: i64, b: i64| (a / b, a % b))
        .build()
        .unwrap();

    state.get_global("divmod");
    call(&mut state, None, (17, 5)).unwrap();
    assert_eq!(state.top(), 2);
    assert_eq!(state.to_integer(1), Some(3));
    assert_eq!(state.to_integer(2), Some(2));
}

#[test]
fn test_light_userdata_passes_through() {
    let mut value = 41u32;
    let pointer = &mut value as *mut u32;
    let mut state = State::new();
    Module::new(&mut state)
        .function("same", |p: *mut u32| p)
        .build()
        .unwrap();

    let back: *mut u32 = call_global(&mut state, "same", (pointer,)).unwrap();
    assert_eq!(back, pointer);
}

// =============================================================================
// Containers
// =============================================================================

#[test]
fn test_sequences_cross_as_tables() {
    let mut state = State::new();
    Module::new(&mut state)
        .function("total", |values: Vec<i64>| values.iter().sum::<i64>())
        .function("range", |n: i64| (1..=n).collect::<Vec<_>>())
        .build()
        .unwrap();

    let total: i64 = call_global(&mut state, "total", (vec![1, 2, 3, 4],)).unwrap();
    assert_eq!(total, 10);
    let range: Vec<i64> = call_global(&mut state, "range", (3,)).unwrap();
    assert_eq!(range, vec![1, 2, 3]);
}

#[test]
fn test_fixed_arrays_default_fill() {
    let mut state = State::new();
    Module::new(&mut state)
        .function("pad", |values: [i64; 4]| values)
        .build()
        .unwrap();

    let padded: [i64; 4] = call_global(&mut state, "pad", (vec![7, 8],)).unwrap();
    assert_eq!(padded, [7, 8, 0, 0]);
}

#[test]
fn test_maps_cross_as_tables() {
    let mut state = State::new();
    Module::new(&mut state)
        .function("invert", |map: FxHashMap<String, i64>| {
            map.into_iter()
                .map(|(k, v)| (v, k))
                .collect::<BTreeMap<i64, String>>()
        })
        .build()
        .unwrap();

    let mut input = FxHashMap::default();
    input.insert("one".to_owned(), 1);
    input.insert("two".to_owned(), 2);
    let inverted: BTreeMap<i64, String> = call_global(&mut state, "invert", (input,)).unwrap();
    assert_eq!(inverted.get(&1).map(String::as_str), Some("one"));
    assert_eq!(inverted.get(&2).map(String::as_str), Some("two"));
}

// =============================================================================
// Classes
// =============================================================================

struct Account {
    owner: String,
    balance: i64,
}

impl Account {
    fn open(owner: String) -> Self {
        Self { owner, balance: 0 }
    }

    fn deposit(&mut self, amount: i64) -> i64 {
        self.balance += amount;
        self.balance
    }

    fn balance(&self) -> i64 {
        self.balance
    }

    fn owner(&self) -> String {
        self.owner.clone()
    }

    fn rename(&mut self, owner: String) {
        self.owner = owner;
    }
}

fn account_class() -> ClassBuilder<Account> {
    ClassBuilder::new("Account")
        .constructor(|| Account::open("nobody".into()))
        .constructor_named("open", Account::open)
        .method("deposit", Account::deposit)
        .method_fn("describe", |a: &Account| format!("{}: {}", a.owner, a.balance))
        .vararg_method("deposit_all", |a: &mut Account, state: &mut dyn ScriptState| {
            for index in 2..=state.top() as i32 {
                a.balance += state.to_integer(index).unwrap_or(0);
            }
            a.balance
        })
        .property("balance", Account::balance)
        .property_rw("owner", Account::owner, Account::rename)
        .constant("CURRENCY", "EUR")
        .enum_value("KIND_CHECKING", 1)
        .function("minimum", || 10)
}

#[test]
fn test_class_table_exports() {
    let mut state = State::new();
    Module::named(&mut state, "bank")
        .class(account_class())
        .build()
        .unwrap();

    state.get_global("bank");
    assert!(state.get_sub_table(-1, "Account"));
    state.get_field(-1, "__classname").unwrap();
    assert_eq!(state.to_str(-1).as_deref(), Some("Account"));
    state.raw_get_field(-2, "CURRENCY");
    assert_eq!(state.to_str(-1).as_deref(), Some("EUR"));
    state.raw_get_field(-3, "KIND_CHECKING");
    assert_eq!(state.to_integer(-1), Some(1));
    state.raw_get_field(-4, "new");
    assert_eq!(state.kind(-1), Some(ValueKind::Function));
    state.raw_get_field(-5, "open");
    assert_eq!(state.kind(-1), Some(ValueKind::Function));
    state.raw_get_field(-6, "minimum");
    state.call(0, Some(1)).unwrap();
    assert_eq!(state.to_integer(-1), Some(10));
}

fn open_account(state: &mut State, owner: &str) {
    state.get_global("Account");
    state.raw_get_field(-1, "open");
    state.remove(-2);
    state.push_string(owner);
    state.call(1, Some(1)).unwrap();
}

#[test]
fn test_methods_and_properties() {
    let mut state = State::new();
    Module::new(&mut state).class(account_class()).build().unwrap();

    open_account(&mut state, "ada");
    call_method(&mut state, 1, "deposit", &[30], 1).unwrap();
    assert_eq!(state.to_integer(-1), Some(30));
    state.pop(1);

    call_method(&mut state, 1, "deposit_all", &[1, 2, 3], 1).unwrap();
    assert_eq!(state.to_integer(-1), Some(36));
    state.pop(1);

    state.raw_get_field(1, "describe");
    state.call(0, Some(1)).unwrap();
    assert_eq!(state.to_str(-1).as_deref(), Some("ada: 36"));
    state.pop(1);

    state.push_string("grace");
    state.set_field(1, "owner").unwrap();
    state.get_field(1, "owner").unwrap();
    assert_eq!(state.to_str(-1).as_deref(), Some("grace"));
    state.get_field(1, "balance").unwrap();
    assert_eq!(state.to_integer(-1), Some(36));
}

#[test]
fn test_read_only_property_ignores_writes() {
    let mut state = State::new();
    Module::new(&mut state).class(account_class()).build().unwrap();

    open_account(&mut state, "ada");
    state.push_integer(1_000_000);
    state.set_field(1, "balance").unwrap();
    state.get_field(1, "balance").unwrap();
    assert_eq!(state.to_integer(-1), Some(0));
}

#[test]
fn test_method_arity_is_enforced() {
    let mut state = State::new();
    Module::new(&mut state).class(account_class()).build().unwrap();

    open_account(&mut state, "ada");
    let err = call_method(&mut state, 1, "deposit", &[], 1).unwrap_err();
    assert_eq!(
        err,
        NativeError::ArityMismatch {
            expected: 2,
            actual: 1
        }
    );
    assert_eq!(state.top(), 1);
}

#[test]
fn test_default_constructor_name_follows_config() {
    let mut state = State::new();
    Registry::install(&mut state, BindConfig::new().with_default_constructor("create"));
    Module::new(&mut state).class(account_class()).build().unwrap();

    state.get_global("Account");
    state.raw_get_field(-1, "create");
    assert_eq!(state.kind(-1), Some(ValueKind::Function));
    state.raw_get_field(-2, "new");
    assert!(state.is_nil(-1));
}

#[test]
fn test_introspection() {
    let mut state = State::new();
    Module::new(&mut state).class(account_class()).build().unwrap();
    let registry = Registry::from_state(&state).unwrap();
    let account = registry.class::<Account>().unwrap();

    assert_eq!(
        account.getters_info(),
        vec![
            ("balance".to_owned(), PropertyKind::Integer),
            ("owner".to_owned(), PropertyKind::String),
        ]
    );
    let properties = account.properties_info();
    assert_eq!(properties[0].access, PropertyAccess::READ);
    assert_eq!(properties[1].access, PropertyAccess::READ_WRITE);
}

// =============================================================================
// Inheritance
// =============================================================================

#[derive(Default)]
struct Named {
    name: String,
}

#[derive(Default)]
struct Tagged {
    tag: i64,
}

/// Two bases, so the second one sits at a non-zero offset.
#[derive(Default)]
struct Item {
    named: Named,
    tagged: Tagged,
    weight: f64,
}

#[derive(Default)]
struct Crate {
    item: Item,
    slots: i64,
}

impl AsBase<Named> for Item {
    fn as_base(&self) -> &Named {
        &self.named
    }
    fn as_base_mut(&mut self) -> &mut Named {
        &mut self.named
    }
}

impl AsBase<Tagged> for Item {
    fn as_base(&self) -> &Tagged {
        &self.tagged
    }
    fn as_base_mut(&mut self) -> &mut Tagged {
        &mut self.tagged
    }
}

impl AsBase<Item> for Crate {
    fn as_base(&self) -> &Item {
        &self.item
    }
    fn as_base_mut(&mut self) -> &mut Item {
        &mut self.item
    }
}

fn inventory(state: &mut State) {
    Module::named(state, "inv")
        .class(
            ClassBuilder::<Named>::new("Named")
                .default_constructor()
                .property_rw("name", |n: &Named| n.name.clone(), |n: &mut Named, v: String| n.name = v)
                .method("shout", |n: &Named| n.name.to_uppercase()),
        )
        .class(
            ClassBuilder::<Tagged>::new("Tagged")
                .property_rw("tag", |t: &Tagged| t.tag, |t: &mut Tagged, v: i64| t.tag = v)
                .method("bump", |t: &mut Tagged| t.tag += 1),
        )
        .class(
            ClassBuilder::<Item>::new("Item")
                .inherits::<Named>()
                .inherits::<Tagged>()
                .default_constructor()
                .property("weight", |i: &Item| i.weight),
        )
        .class(
            ClassBuilder::<Crate>::new("Crate")
                .inherits::<Item>()
                .default_constructor()
                .property_rw("slots", |c: &Crate| c.slots, |c: &mut Crate, v: i64| c.slots = v),
        )
        .function("tag_of", |t: Instance<Tagged>| t.borrow().map(|t| t.tag))
        .build()
        .unwrap();
}

fn construct(state: &mut State, class: &str) {
    state.get_global("inv");
    state.raw_get_field(-1, class);
    state.raw_get_field(-1, "new");
    state.remove(-2);
    state.remove(-2);
    state.call(0, Some(1)).unwrap();
}

#[test]
fn test_second_base_accessors_apply_offset() {
    let mut state = State::new();
    inventory(&mut state);

    construct(&mut state, "Item");
    state.push_integer(7);
    state.set_field(1, "tag").unwrap();
    state.push_string("lamp");
    state.set_field(1, "name").unwrap();
    call_method(&mut state, 1, "bump", &[], 0).unwrap();

    let item = Instance::<Item>::from_script(&mut state, 1).unwrap();
    let item = item.borrow().unwrap();
    assert_eq!(item.tagged.tag, 8);
    assert_eq!(item.named.name, "lamp");
}

#[test]
fn test_multi_level_chain_composes_in_order() {
    let mut state = State::new();
    inventory(&mut state);

    construct(&mut state, "Crate");
    state.push_integer(3);
    state.set_field(1, "tag").unwrap();
    state.push_string("box");
    state.set_field(1, "name").unwrap();
    state.push_integer(12);
    state.set_field(1, "slots").unwrap();

    call_method(&mut state, 1, "shout", &[], 1).unwrap();
    assert_eq!(state.to_str(-1).as_deref(), Some("BOX"));
    state.pop(1);

    let handle = Instance::<Crate>::from_script(&mut state, 1).unwrap();
    {
        let krate = handle.borrow().unwrap();
        assert_eq!(krate.slots, 12);
        assert_eq!(krate.item.tagged.tag, 3);
    }

    let registry = Registry::from_state(&state).unwrap();
    let class = registry.class::<Crate>().unwrap();
    assert_eq!(class.getter("tag").unwrap().chain().len(), 2);
    assert!(class.is_a_name("Tagged"));
    assert!(class.is_a_name("Item"));
}

#[test]
fn test_derived_instance_decodes_as_base() {
    let mut state = State::new();
    inventory(&mut state);

    construct(&mut state, "Crate");
    state.push_integer(5);
    state.set_field(1, "tag").unwrap();

    state.get_global("inv");
    state.raw_get_field(-1, "tag_of");
    state.remove(-2);
    state.push_value(1);
    state.call(1, Some(1)).unwrap();
    assert_eq!(state.to_integer(-1), Some(5));
}

#[test]
fn test_unrelated_instance_is_rejected() {
    let mut state = State::new();
    inventory(&mut state);

    construct(&mut state, "Named");
    let err = Instance::<Tagged>::from_script(&mut state, 1).err().unwrap();
    assert!(matches!(
        err,
        NativeError::Conversion(ConversionError::ClassMismatch { .. })
    ));
}

#[test]
fn test_base_registered_later_fails() {
    let mut state = State::new();
    let err = Module::new(&mut state)
        .class(ClassBuilder::<Item>::new("Item").inherits::<Named>())
        .class(ClassBuilder::<Named>::new("Named"))
        .build()
        .unwrap_err();
    assert!(matches!(err, RegistrationError::BaseNotRegistered { .. }));
}

// =============================================================================
// Scopes
// =============================================================================

#[test]
fn test_nested_scopes_and_enum_values() {
    let mut state = State::new();
    Module::named(&mut state, "engine")
        .scope(
            Scope::new("render")
                .enum_value("MODE_FILL", 0)
                .enum_value("MODE_WIRE", 1)
                .scope(Scope::new("debug").constant("ENABLED", true)),
        )
        .function("version", || "1.2")
        .build()
        .unwrap();

    state.get_global("engine");
    state.raw_get_field(-1, "version");
    state.call(0, Some(1)).unwrap();
    assert_eq!(state.to_str(-1).as_deref(), Some("1.2"));
    state.pop(1);

    assert!(state.get_sub_table(-1, "render"));
    state.raw_get_field(-1, "MODE_WIRE");
    assert_eq!(state.to_integer(-1), Some(1));
    state.pop(1);
    assert!(state.get_sub_table(-1, "debug"));
    state.raw_get_field(-1, "ENABLED");
    assert!(state.to_boolean(-1));
}

#[test]
fn test_class_inside_scope() {
    let mut state = State::new();
    Module::named(&mut state, "outer")
        .scope(Scope::new("inner").class(account_class()))
        .build()
        .unwrap();

    state.get_global("outer");
    assert!(state.get_sub_table(-1, "inner"));
    assert!(state.get_sub_table(-1, "Account"));
    state.get_field(-1, "__classname").unwrap();
    assert_eq!(state.to_str(-1).as_deref(), Some("Account"));
}

#[test]
fn test_existing_tables_are_extended() {
    let mut state = State::new();
    state.create_table(0, 0);
    state.push_integer(1);
    state.raw_set_field(-2, "keep");
    state.set_global("util");

    Module::named(&mut state, "util")
        .constant("added", 2)
        .build()
        .unwrap();

    state.get_global("util");
    state.raw_get_field(-1, "keep");
    assert_eq!(state.to_integer(-1), Some(1));
    state.raw_get_field(-2, "added");
    assert_eq!(state.to_integer(-1), Some(2));
}

#[test]
fn test_class_name_is_read_only() {
    let mut state = State::new();
    Module::new(&mut state).class(account_class()).build().unwrap();

    state.get_global("Account");
    state.push_string("Hijacked");
    let err = state.set_field(1, "__classname").unwrap_err();
    assert_eq!(
        err,
        NativeError::ReadOnlyField {
            class: "Account".into(),
            key: "__classname".into()
        }
    );
    assert_eq!(state.top(), 1);

    state.push_integer(3);
    state.set_field(1, "extra").unwrap();
    state.raw_get_field(1, "extra");
    assert_eq!(state.to_integer(-1), Some(3));
    state.get_field(1, "__classname").unwrap();
    assert_eq!(state.to_str(-1).as_deref(), Some("Account"));
}

#[test]
fn test_scope_over_non_table_global_fails_cleanly() {
    let mut state = State::new();
    state.push_integer(5);
    state.set_global("foo");

    let err = Module::new(&mut state)
        .scope(Scope::new("foo").scope(Scope::new("bar").constant("X", 1)))
        .build()
        .unwrap_err();
    assert!(matches!(err, RegistrationError::ScopeNotTable { .. }));
    assert_eq!(state.top(), 0);

    state.get_global("foo");
    assert_eq!(state.to_integer(-1), Some(5));
}

// =============================================================================
// Unknown-key policy
// =============================================================================

#[test]
fn test_unknown_keys_are_lenient_by_default() {
    let mut state = State::new();
    Module::new(&mut state).class(account_class()).build().unwrap();

    open_account(&mut state, "ada");
    state.get_field(1, "nope").unwrap();
    assert!(state.is_nil(-1));
    state.pop(1);
    state.push_integer(1);
    state.set_field(1, "nope").unwrap();
    state.get_field(1, "nope").unwrap();
    assert!(state.is_nil(-1));
}

#[test]
fn test_unknown_keys_can_be_errors() {
    let mut state = State::new();
    Registry::install(
        &mut state,
        BindConfig::new().with_unknown_keys(UnknownKeyPolicy::Error),
    );
    Module::new(&mut state).class(account_class()).build().unwrap();

    open_account(&mut state, "ada");
    let err = state.get_field(1, "nope").unwrap_err();
    assert_eq!(
        err,
        NativeError::UnknownAccessor {
            class: "Account".into(),
            key: "nope".into()
        }
    );
    state.push_integer(1);
    assert!(state.set_field(1, "nope").is_err());
}

// =============================================================================
// Lifecycle
// =============================================================================

struct Tracked {
    drops: Rc<Cell<usize>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

fn tracked_module(state: &mut State, drops: Rc<Cell<usize>>) {
    Module::new(state)
        .class(ClassBuilder::<Tracked>::new("Tracked").method("ping", |_: &Tracked| "pong"))
        .function("make", move || Owned(Tracked { drops: drops.clone() }))
        .build()
        .unwrap();
}

#[test]
fn test_owned_instance_is_finalized_once() {
    let drops = Rc::new(Cell::new(0));
    let mut state = State::new();
    tracked_module(&mut state, drops.clone());

    state.get_global("make");
    state.call(0, Some(1)).unwrap();
    call_method(&mut state, 1, "ping", &[], 1).unwrap();
    assert_eq!(state.to_str(-1).as_deref(), Some("pong"));
    state.set_top(0);

    state.collect_garbage();
    assert_eq!(drops.get(), 1);
    state.collect_garbage();
    assert_eq!(drops.get(), 1);
    assert_eq!(Registry::from_state(&state).unwrap().instance_count(), 0);
}

#[test]
fn test_live_wrapper_survives_collection() {
    let drops = Rc::new(Cell::new(0));
    let mut state = State::new();
    tracked_module(&mut state, drops.clone());

    state.get_global("make");
    state.call(0, Some(1)).unwrap();
    state.set_global("keep");
    state.collect_garbage();
    assert_eq!(drops.get(), 0);

    state.push_nil();
    state.set_global("keep");
    state.collect_garbage();
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_shared_instance_is_not_freed_by_collection() {
    let drops = Rc::new(Cell::new(0));
    let mut state = State::new();
    tracked_module(&mut state, drops.clone());

    let shared = Shared::new(Tracked {
        drops: drops.clone(),
    });
    shared.clone().to_script(&mut state).unwrap();
    shared.clone().to_script(&mut state).unwrap();
    assert!(state.raw_equal(1, 2));
    state.set_top(0);

    state.collect_garbage();
    assert_eq!(drops.get(), 0);
    assert_eq!(Rc::strong_count(&shared.0), 1);
    drop(shared);
    assert_eq!(drops.get(), 1);
}
