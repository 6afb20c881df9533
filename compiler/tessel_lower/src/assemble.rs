//! Module-level entry points.
//!
//! A conversion resolves a worklist with a [`ConversionOrder`], converts each
//! record into one package in worklist order, and verifies the package as a
//! whole. The package is named after the module being converted.

use tessel_ast::{ModuleId, Program, Span, TypeInfo};
use tessel_ir::{verify_package, Package};
use tracing::debug;

use crate::convert::{convert_function, ConversionContext};
use crate::{
    ConstEvaluator, ConversionOrder, ConversionRecord, DependencyOrder, LowerError, LowerOptions,
};

/// Convert every function of `module` (and every instantiation it reaches)
/// into a verified package.
pub fn convert_module(
    program: &Program,
    module: ModuleId,
    type_info: &TypeInfo,
    evaluator: &dyn ConstEvaluator,
    options: LowerOptions,
) -> Result<Package, LowerError> {
    convert_module_with_order(
        program,
        module,
        type_info,
        evaluator,
        options,
        &DependencyOrder,
    )
}

/// Like [`convert_module`], with a caller-supplied conversion order.
pub fn convert_module_with_order(
    program: &Program,
    module: ModuleId,
    type_info: &TypeInfo,
    evaluator: &dyn ConstEvaluator,
    options: LowerOptions,
    order: &dyn ConversionOrder,
) -> Result<Package, LowerError> {
    let records = order.order(program, module, type_info, options.include_tests)?;
    let cx = ConversionContext {
        program,
        type_info,
        evaluator,
        options,
    };
    convert_records(cx, &program.module(module).name, &records)
}

/// [`convert_module`], returning the package's IR text.
pub fn convert_module_to_text(
    program: &Program,
    module: ModuleId,
    type_info: &TypeInfo,
    evaluator: &dyn ConstEvaluator,
    options: LowerOptions,
) -> Result<String, LowerError> {
    let package = convert_module(program, module, type_info, evaluator, options)?;
    Ok(package.dump_ir())
}

/// Convert the non-parametric function `name` of `module` together with
/// everything it reaches, returning the IR text.
pub fn convert_entry_function(
    program: &Program,
    module: ModuleId,
    name: &str,
    type_info: &TypeInfo,
    evaluator: &dyn ConstEvaluator,
    options: LowerOptions,
) -> Result<String, LowerError> {
    let source = program.module(module);
    let item = source.get_function(&program.arena, name).ok_or_else(|| {
        LowerError::structural(
            Span::DUMMY,
            format!("module `{}` has no function `{name}`", source.name),
        )
    })?;
    if program
        .arena
        .function(item)
        .is_some_and(|f| f.is_parametric())
    {
        return Err(LowerError::structural(
            program.arena.span(item),
            format!("entry function `{name}` is parametric"),
        ));
    }

    let records = DependencyOrder.reachable_from(program, type_info, item)?;
    let cx = ConversionContext {
        program,
        type_info,
        evaluator,
        options,
    };
    let package = convert_records(cx, &source.name, &records)?;
    Ok(package.dump_ir())
}

fn convert_records(
    cx: ConversionContext<'_>,
    package_name: &str,
    records: &[ConversionRecord],
) -> Result<Package, LowerError> {
    debug!(package = package_name, functions = records.len(), "convert package");
    let mut package = Package::new(package_name);
    for record in records {
        convert_function(cx, &mut package, record)?;
    }
    verify_package(&package)?;
    debug!(
        package = package_name,
        functions = package.len(),
        "package verified"
    );
    Ok(package)
}
