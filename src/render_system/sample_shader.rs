vulkano_shaders::shader! {
    ty: "compute",
    linalg_type: "nalgebra",
    src: r"
#version 460
#extension GL_EXT_scalar_block_layout: require

layout(local_size_x = 32, local_size_y = 32, local_size_z = 1) in;

struct Sphere {
    vec3 center;
    float radius;
    vec3 albedo;
    uint material;
    vec3 emission;
    float param;
};

const uint MATERIAL_LAMBERT = 0u;
const uint MATERIAL_METAL = 1u;
const uint MATERIAL_EMISSIVE = 2u;

layout(set = 0, binding = 0, rgba32f) writeonly uniform image2D u_colorTarget;
layout(set = 0, binding = 1) uniform sampler2D u_colorCache;
layout(set = 0, binding = 2, scalar) readonly buffer SceneObjects {
    Sphere spheres[];
};
layout(set = 0, binding = 3) uniform sampler2D u_noise;

layout(push_constant, scalar) uniform PushConstants {
    mat4 u_eye_to_world;
    vec3 u_eye_position;
    float u_half_wd;
    float u_half_ht;
    float u_eye_to_image;
    int u_num_objects;
    int u_render_pass;
    int u_num_bounces;
    int u_shading;
};

// source: https://stackoverflow.com/questions/4200224/random-noise-functions-for-glsl
// Construct a float with half-open range [0:1] using low 23 bits.
// All zeroes yields 0.0, all ones yields the next smallest representable value below 1.0.
float floatConstruct( uint m ) {
    const uint ieeeMantissa = 0x007FFFFFu; // binary32 mantissa bitmask
    const uint ieeeOne      = 0x3F800000u; // 1.0 in IEEE binary32

    m &= ieeeMantissa;                     // Keep only mantissa bits (fractional part)
    m |= ieeeOne;                          // Add fractional part to 1.0

    float  f = uintBitsToFloat( m );       // Range [1:2]
    return f - 1.0;                        // Range [0:1]
}

// accepts a seed, h, and a 32 bit integer, k, and returns a 32 bit integer
// corresponds to the loop in the murmur3 hash algorithm
// the output should be passed to murmur3_finalize before being used
uint murmur3_combine(uint h, uint k) {
    // murmur3_32_scramble
    k *= 0x1b873593;

    h ^= k;
    h = (h << 13) | (h >> 19);
    h = h * 5 + 0xe6546b64;
    return h;
}

// accepts a seed, h and returns a random 32 bit integer
// corresponds to the last part of the murmur3 hash algorithm
uint murmur3_finalize(uint h) {
    h ^= h >> 16;
    h *= 0x85ebca6b;
    h ^= h >> 13;
    h *= 0xc2b2ae35;
    h ^= h >> 16;
    return h;
}

uint murmur3_combinef(uint h, float k) {
    return murmur3_combine(h, floatBitsToUint(k));
}

float next_rand(uint seed, inout uint salt) {
    float f = floatConstruct(murmur3_finalize(murmur3_combine(seed, salt)));
    salt++;
    return f;
}

float intersect_sphere(vec3 ro, vec3 rd, Sphere s) {
    vec3 oc = ro - s.center;
    float b = dot(oc, rd);
    float c = dot(oc, oc) - s.radius * s.radius;
    float disc = b * b - c;
    if (disc < 0.0) {
        return -1.0;
    }
    float sq = sqrt(disc);
    float t = -b - sq;
    if (t > 1e-3) {
        return t;
    }
    t = -b + sq;
    if (t > 1e-3) {
        return t;
    }
    return -1.0;
}

int nearest_hit(vec3 ro, vec3 rd, out float t_hit) {
    int hit = -1;
    float nearest = 1e30;
    for (int i = 0; i < u_num_objects; i++) {
        float t = intersect_sphere(ro, rd, spheres[i]);
        if (t > 0.0 && t < nearest) {
            nearest = t;
            hit = i;
        }
    }
    t_hit = nearest;
    return hit;
}

vec3 sky_radiance(vec3 rd) {
    return mix(vec3(1.0), vec3(0.5, 0.7, 1.0), 0.5 * (rd.z + 1.0));
}

// cosine-weighted hemisphere sample around n
vec3 sample_hemisphere(vec3 n, uint seed, inout uint salt) {
    float r1 = next_rand(seed, salt);
    float r2 = next_rand(seed, salt);
    float phi = 6.28318530718 * r1;
    vec3 a = abs(n.x) > 0.9 ? vec3(0.0, 1.0, 0.0) : vec3(1.0, 0.0, 0.0);
    vec3 tangent = normalize(cross(a, n));
    vec3 bitangent = cross(n, tangent);
    float sq = sqrt(r2);
    return normalize(tangent * cos(phi) * sq + bitangent * sin(phi) * sq + n * sqrt(1.0 - r2));
}

vec3 sample_sphere(uint seed, inout uint salt) {
    float z = 2.0 * next_rand(seed, salt) - 1.0;
    float phi = 6.28318530718 * next_rand(seed, salt);
    float r = sqrt(max(1.0 - z * z, 0.0));
    return vec3(r * cos(phi), r * sin(phi), z);
}

vec3 trace_path(vec3 ro, vec3 rd, uint seed) {
    vec3 radiance = vec3(0.0);
    vec3 throughput = vec3(1.0);
    uint salt = 2u;

    for (int bounce = 0; bounce <= u_num_bounces; bounce++) {
        float t;
        int hit = nearest_hit(ro, rd, t);
        if (hit < 0) {
            radiance += throughput * sky_radiance(rd);
            break;
        }

        Sphere s = spheres[hit];
        if (s.material == MATERIAL_EMISSIVE) {
            radiance += throughput * s.emission;
            break;
        }

        vec3 p = ro + t * rd;
        vec3 n = normalize(p - s.center);
        if (dot(n, rd) > 0.0) {
            n = -n;
        }

        if (s.material == MATERIAL_METAL) {
            rd = normalize(reflect(rd, n) + s.param * sample_sphere(seed, salt));
            if (dot(rd, n) <= 0.0) {
                break;
            }
        } else {
            rd = sample_hemisphere(n, seed, salt);
        }
        throughput *= s.albedo;
        ro = p + 1e-3 * n;
    }

    return radiance;
}

// single-hit preview: albedo lit head-on, no scattering
vec3 trace_albedo(vec3 ro, vec3 rd) {
    float t;
    int hit = nearest_hit(ro, rd, t);
    if (hit < 0) {
        return sky_radiance(rd);
    }
    Sphere s = spheres[hit];
    vec3 n = normalize(ro + t * rd - s.center);
    vec3 base = s.material == MATERIAL_EMISSIVE ? s.emission : s.albedo;
    return base * abs(dot(n, rd));
}

void main() {
    uint xsize = uint(2.0 * u_half_wd);
    uint ysize = uint(2.0 * u_half_ht);
    if (gl_GlobalInvocationID.x >= xsize || gl_GlobalInvocationID.y >= ysize) {
        return;
    }
    uvec2 pix = gl_GlobalInvocationID.xy;

    vec4 noise = texelFetch(u_noise, ivec2(pix) % textureSize(u_noise, 0), 0);
    uint seed = murmur3_combinef(murmur3_combinef(uint(u_render_pass), noise.x), noise.y);
    seed = murmur3_combine(seed, pix.y * xsize + pix.x);

    // pinhole projection, view space is x-right / y-forward / z-up
    uint salt = 0u;
    float jx = next_rand(seed, salt);
    float jy = next_rand(seed, salt);
    vec3 dir_view = vec3(
        (float(pix.x) + jx) - u_half_wd,
        u_eye_to_image,
        u_half_ht - (float(pix.y) + jy));
    vec3 rd = normalize((u_eye_to_world * vec4(dir_view, 0.0)).xyz);

    vec3 radiance;
    if (u_shading == 0) {
        radiance = trace_albedo(u_eye_position, rd);
    } else {
        radiance = trace_path(u_eye_position, rd, seed);
    }

    // add this pass's sample to the running sum from the prior passes
    vec4 prior = texelFetch(u_colorCache, ivec2(pix), 0);
    imageStore(u_colorTarget, ivec2(pix), prior + vec4(radiance, 1.0));
}
",
}
