//! The preview shader must pass naga validation.

use spoutfill::shader::BLIT_SHADER;

fn validate(source: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| format!("WGSL parse error: {:?}", e))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("WGSL validation error: {:?}", e))?;

    Ok(module)
}

#[test]
fn test_blit_shader_validates() {
    validate(BLIT_SHADER).expect("blit shader should be valid");
}

#[test]
fn test_blit_shader_entry_points() {
    let module = validate(BLIT_SHADER).unwrap();
    let mut names: Vec<(&str, naga::ShaderStage)> = module
        .entry_points
        .iter()
        .map(|ep| (ep.name.as_str(), ep.stage))
        .collect();
    names.sort_by_key(|(name, _)| *name);
    assert_eq!(
        names,
        vec![
            ("fs_main", naga::ShaderStage::Fragment),
            ("vs_main", naga::ShaderStage::Vertex),
        ]
    );
}

#[test]
fn test_blit_uniform_block_matches_rust_layout() {
    let module = validate(BLIT_SHADER).unwrap();
    let (_, ty) = module
        .types
        .iter()
        .find(|(_, ty)| ty.name.as_deref() == Some("BlitUniforms"))
        .expect("BlitUniforms struct");
    match &ty.inner {
        naga::TypeInner::Struct { span, .. } => {
            assert_eq!(*span as usize, std::mem::size_of::<spoutfill::shader::BlitUniforms>());
        }
        other => panic!("BlitUniforms is not a struct: {:?}", other),
    }
}
