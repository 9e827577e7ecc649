vulkano_shaders::shader! {
    ty: "compute",
    linalg_type: "nalgebra",
    src: r"
#version 460
#extension GL_EXT_scalar_block_layout: require
#extension GL_EXT_shader_explicit_arithmetic_types_int8: require

layout(local_size_x = 32, local_size_y = 32, local_size_z = 1) in;

layout(set = 0, binding = 0) uniform sampler2D u_colorCache;

layout(set = 0, binding = 1) writeonly buffer OutputsImage {
    u8vec4 output_image[];
};

layout(push_constant, scalar) uniform PushConstants {
    float u_half_wd;
    float u_half_ht;
    int u_render_pass;
};

void main() {
    uint xsize = uint(2.0 * u_half_wd);
    uint ysize = uint(2.0 * u_half_ht);
    if (gl_GlobalInvocationID.x >= xsize || gl_GlobalInvocationID.y >= ysize) {
        return;
    }

    vec4 cache = texelFetch(u_colorCache, ivec2(gl_GlobalInvocationID.xy), 0);

    // the cache holds a sum of u_render_pass samples
    vec3 color = cache.rgb / float(max(u_render_pass, 1));
    color = clamp(color, vec3(0.0), vec3(1.0));
    color = pow(color, vec3(1.0 / 2.2));

    output_image[gl_GlobalInvocationID.y * xsize + gl_GlobalInvocationID.x] =
        u8vec4(color.zyx * 255.0, 255);
}
",
}
