use std::sync::Arc;

use vulkano::{
    command_buffer::{AutoCommandBufferBuilder, ClearColorImageInfo, PrimaryAutoCommandBuffer},
    device::DeviceOwned,
    format::{ClearColorValue, Format},
    image::{
        sampler::{Filter, Sampler, SamplerAddressMode, SamplerCreateInfo},
        view::ImageView,
        Image, ImageCreateInfo, ImageType, ImageUsage,
    },
    memory::allocator::{AllocationCreateInfo, StandardMemoryAllocator},
};

use crate::error::RenderError;

pub const CACHE_FORMAT: Format = Format::R32G32B32A32_SFLOAT;

// Toggling index into the cache's fixed pair of image slots. Exactly one
// slot is the write target at any time; the other holds the most recently
// completed accumulated result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SlotPair {
    write: usize,
}

impl SlotPair {
    fn new() -> SlotPair {
        SlotPair { write: 0 }
    }

    fn swap(&mut self) {
        self.write ^= 1;
    }

    fn write_slot(self) -> usize {
        self.write
    }

    fn read_slot(self) -> usize {
        self.write ^ 1
    }
}

/// Double-buffered accumulation storage. Two equally sized RGBA32F images
/// persist the running per-pixel sample sum across passes; their
/// source/target roles exchange once per pass.
pub struct ColorCache {
    images: [Arc<Image>; 2],
    views: [Arc<ImageView>; 2],
    sampler: Arc<Sampler>,
    slots: SlotPair,
}

impl ColorCache {
    pub fn new(
        memory_allocator: Arc<StandardMemoryAllocator>,
        extent: [u32; 2],
    ) -> Result<ColorCache, RenderError> {
        let device = memory_allocator.device().clone();

        let make_image = || {
            Image::new(
                memory_allocator.clone(),
                ImageCreateInfo {
                    image_type: ImageType::Dim2d,
                    format: CACHE_FORMAT,
                    extent: [extent[0], extent[1], 1],
                    usage: ImageUsage::STORAGE | ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
                    ..Default::default()
                },
                AllocationCreateInfo::default(),
            )
        };
        let images = [make_image()?, make_image()?];
        let views = [
            ImageView::new_default(images[0].clone())?,
            ImageView::new_default(images[1].clone())?,
        ];

        // point sampling with edge clamping: each texel must accumulate
        // exactly its own sample stream
        let sampler = Sampler::new(
            device,
            SamplerCreateInfo {
                mag_filter: Filter::Nearest,
                min_filter: Filter::Nearest,
                address_mode: [SamplerAddressMode::ClampToEdge; 3],
                ..Default::default()
            },
        )?;

        Ok(ColorCache {
            images,
            views,
            sampler,
            slots: SlotPair::new(),
        })
    }

    /// Exchanges source/target roles. Must be called exactly once per pass,
    /// before the sampling dispatch is recorded. Returns the new write
    /// target and the read-only source holding the prior accumulated sum.
    pub fn swap_for_pass(&mut self) -> (Arc<ImageView>, Arc<ImageView>) {
        self.slots.swap();
        (
            self.views[self.slots.write_slot()].clone(),
            self.views[self.slots.read_slot()].clone(),
        )
    }

    /// The buffer holding the most recently completed pass's output.
    pub fn current_result(&self) -> Arc<ImageView> {
        self.views[self.slots.write_slot()].clone()
    }

    pub fn sampler(&self) -> Arc<Sampler> {
        self.sampler.clone()
    }

    /// Records zero-clears of both images. Issued at the first pass of every
    /// convergence run so a restart never blends samples from the previous
    /// camera pose into the new run.
    pub fn record_clear(&self, builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>) {
        for image in self.images.iter() {
            builder
                .clear_color_image(ClearColorImageInfo {
                    clear_value: ClearColorValue::Float([0.0; 4]),
                    ..ClearColorImageInfo::image(image.clone())
                })
                .unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_slot_is_writable() {
        let mut slots = SlotPair::new();
        for _ in 0..5 {
            assert_ne!(slots.write_slot(), slots.read_slot());
            slots.swap();
        }
    }

    #[test]
    fn swap_alternates_roles_every_call() {
        let mut slots = SlotPair::new();
        let mut previous_read = None;
        for _ in 0..8 {
            slots.swap();
            // the new write target is the slot that was read from last pass
            if let Some(read) = previous_read {
                assert_eq!(slots.write_slot(), read);
            }
            previous_read = Some(slots.read_slot());
        }
    }

    #[test]
    fn double_swap_restores_the_original_assignment() {
        let mut slots = SlotPair::new();
        let original = slots;
        slots.swap();
        assert_ne!(slots, original);
        slots.swap();
        assert_eq!(slots, original);
    }
}
